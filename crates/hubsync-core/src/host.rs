// ── Host framework boundary ──
//
// What the automation host gives a device proxy: a property sink and a
// status sink. Everything the proxy publishes goes through `HostSink`,
// so the host can be a real framework adapter or a recording test double.

use chrono::{DateTime, Local};
use serde::Serialize;

/// Channel (property) names as the host knows them.
pub mod channel {
    pub const CURRENT_TEMPERATURE: &str = "currentTemp";
    pub const CURRENT_HUMIDITY: &str = "currentHumidity";
    pub const SYSTEM_MODE: &str = "sysMode";
    pub const HEAT_SETPOINT: &str = "heatSP";
    pub const COOL_SETPOINT: &str = "coolSP";
    pub const FAN_MODE: &str = "fanMode";
    pub const SCHEDULE_MODE: &str = "scheduleMode";
    pub const HOLD_UNTIL: &str = "holdUntil";
    pub const DISPLAY_UNITS: &str = "displayUnits";

    pub const POWER: &str = "power";
    pub const LEVEL: &str = "level";
}

/// A value published to one host channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(i64),
    Text(String),
    Percent(u8),
    Switch(bool),
    DateTime(DateTime<Local>),
}

/// Host-visible health of a bridge or device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ThingStatus {
    Unknown,
    Online,
    Offline,
}

/// Why a thing is not online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusDetail {
    None,
    ConfigurationError,
    CommunicationError,
    /// The bridge no longer reports this device.
    Gone,
    BridgeOffline,
}

/// A status transition with an optional human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub status: ThingStatus,
    pub detail: StatusDetail,
    pub reason: Option<String>,
}

impl StatusUpdate {
    pub fn online() -> Self {
        Self {
            status: ThingStatus::Online,
            detail: StatusDetail::None,
            reason: None,
        }
    }

    pub fn offline(detail: StatusDetail, reason: impl Into<String>) -> Self {
        Self {
            status: ThingStatus::Offline,
            detail,
            reason: Some(reason.into()),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == ThingStatus::Online
    }
}

/// Sink for everything a proxy reports to the host.
///
/// Implementations must tolerate repeated identical calls.
pub trait HostSink: Send + Sync {
    fn publish_property(&self, name: &str, value: PropertyValue);
    fn publish_status(&self, status: StatusUpdate);
}
