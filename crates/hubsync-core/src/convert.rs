// ── Wire-to-domain conversion ──
//
// Missing or malformed portal fields fall back to the documented
// defaults one field at a time; nothing here can fail.

use hubsync_api::{ControlChanges, RawLight, RawThermostat};

use crate::error::CoreError;
use crate::model::{
    Device, DeviceId, DeviceState, FanMode, LightState, ScheduleMode, SystemMode, ThermostatState,
};

impl From<&RawThermostat> for ThermostatState {
    fn from(raw: &RawThermostat) -> Self {
        let defaults = Self::default();
        let ui = &raw.ui;
        Self {
            temperature: ui.disp_temperature.unwrap_or(defaults.temperature),
            humidity: ui.indoor_humidity.unwrap_or(defaults.humidity),
            system_mode: ui
                .system_switch_position
                .map_or(defaults.system_mode, SystemMode::from_code),
            heat_setpoint: ui.heat_setpoint.unwrap_or(defaults.heat_setpoint),
            cool_setpoint: ui.cool_setpoint.unwrap_or(defaults.cool_setpoint),
            fan_mode: raw.fan.fan_mode.map_or(defaults.fan_mode, FanMode::from_code),
            schedule: ui
                .current_setpoint_status
                .map_or(defaults.schedule, ScheduleMode::from_code),
            hold_period: ui.heat_next_period.unwrap_or(defaults.hold_period),
            display_units: ui.display_units.clone().unwrap_or(defaults.display_units),
        }
    }
}

impl From<&RawThermostat> for Device {
    fn from(raw: &RawThermostat) -> Self {
        let id = DeviceId::from(raw.device_id);
        let label = raw
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Thermostat {id}"));
        Device {
            id,
            label,
            state: DeviceState::Thermostat(ThermostatState::from(raw)),
        }
    }
}

impl From<&RawLight> for LightState {
    fn from(raw: &RawLight) -> Self {
        Self {
            on: raw.on,
            level: if raw.on { raw.level.min(100) } else { 0 },
            offline: raw.offline,
        }
    }
}

impl From<&RawLight> for Device {
    fn from(raw: &RawLight) -> Self {
        Device {
            id: DeviceId::new(raw.did.clone()),
            label: raw.name.clone(),
            state: DeviceState::Light(LightState::from(raw)),
        }
    }
}

/// Portal device ids are numeric; anything else cannot address a thermostat.
pub fn portal_device_id(id: &DeviceId) -> Result<i64, CoreError> {
    id.as_str()
        .parse()
        .map_err(|_| CoreError::DeviceNotFound {
            id: id.to_string(),
        })
}

/// The submission body for a desired thermostat state.
pub fn control_changes(device_id: i64, desired: &ThermostatState) -> ControlChanges {
    ControlChanges::new(
        device_id,
        desired.system_mode.code(),
        desired.heat_setpoint,
        desired.cool_setpoint,
        desired.schedule.code(),
        desired.submitted_hold_period(),
        desired.fan_mode.code(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hubsync_api::portal::{FanData, UiData};
    use pretty_assertions::assert_eq;

    #[test]
    fn thermostat_fields_default_individually() {
        let raw = RawThermostat {
            device_id: 1001,
            name: None,
            ui: UiData {
                disp_temperature: Some(72),
                heat_setpoint: Some(68),
                system_switch_position: Some(7),
                ..UiData::default()
            },
            fan: FanData::default(),
        };

        let device = Device::from(&raw);
        let state = device.state.as_thermostat().unwrap();

        assert_eq!(device.id.as_str(), "1001");
        assert_eq!(device.label, "Thermostat 1001");
        assert_eq!(state.temperature, 72);
        assert_eq!(state.humidity, 35);
        assert_eq!(state.heat_setpoint, 68);
        assert_eq!(state.system_mode, SystemMode::Unknown(7));
        assert_eq!(state.fan_mode, FanMode::Schedule);
    }

    #[test]
    fn unknown_codes_resubmit_unchanged() {
        let state = ThermostatState {
            system_mode: SystemMode::Unknown(7),
            fan_mode: FanMode::Unknown(9),
            ..ThermostatState::default()
        };
        let body = control_changes(1001, &state);
        assert_eq!(body.system_switch, 7);
        assert_eq!(body.fan_mode, 9);
    }

    #[test]
    fn light_level_forced_to_zero_when_off() {
        let raw = RawLight {
            did: "B2".into(),
            name: "Lamp".into(),
            on: false,
            level: 80,
            known: true,
            offline: false,
        };
        assert_eq!(LightState::from(&raw).level, 0);
    }

    #[test]
    fn non_numeric_portal_id_is_not_found() {
        assert!(portal_device_id(&DeviceId::from("abc")).is_err());
        assert_eq!(portal_device_id(&DeviceId::from("1001")).unwrap(), 1001);
    }
}
