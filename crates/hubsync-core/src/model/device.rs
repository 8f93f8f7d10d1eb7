// ── Device snapshot types ──
//
// A `Device` is what a poll returns per entry and what events carry.
// Snapshots are immutable; a newer one replaces an older one whole.

use serde::{Deserialize, Serialize};

use super::device_id::DeviceId;
use super::light::LightState;
use super::thermostat::ThermostatState;

/// Which vendor flavor a device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
    Thermostat,
    Light,
}

/// All observable attributes of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeviceState {
    Thermostat(ThermostatState),
    Light(LightState),
}

impl DeviceState {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Thermostat(_) => DeviceKind::Thermostat,
            Self::Light(_) => DeviceKind::Light,
        }
    }

    pub fn as_thermostat(&self) -> Option<&ThermostatState> {
        match self {
            Self::Thermostat(t) => Some(t),
            Self::Light(_) => None,
        }
    }

    pub fn as_light(&self) -> Option<&LightState> {
        match self {
            Self::Light(l) => Some(l),
            Self::Thermostat(_) => None,
        }
    }

    /// Why the bridge itself reports this device unreachable, if it does.
    pub fn unreachable_reason(&self) -> Option<&'static str> {
        match self {
            Self::Light(l) if l.offline => Some("gateway reports light offline"),
            Self::Light(_) | Self::Thermostat(_) => None,
        }
    }
}

/// One listed device: identity, display label, and state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub label: String,
    pub state: DeviceState,
}

impl Device {
    pub fn new(id: impl Into<DeviceId>, label: impl Into<String>, state: DeviceState) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            state,
        }
    }

    /// The same device carrying a different state.
    pub fn with_state(&self, state: DeviceState) -> Self {
        Self {
            id: self.id.clone(),
            label: self.label.clone(),
            state,
        }
    }
}
