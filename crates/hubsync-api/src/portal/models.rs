// Portal wire types
//
// The portal speaks PascalCase JSON with loosely typed numbers: some
// firmware sends `"70"`, some `70`, some `70.0`, and fields go missing.
// Every numeric field decodes through `lenient` so one odd value never
// rejects the whole payload.

use serde::{Deserialize, Serialize};

/// One entry of `GetLocationListData`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    #[serde(rename = "LocationID", default, deserialize_with = "lenient::integer")]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub devices: Vec<LocationDevice>,
}

/// A thermostat reference inside a location.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocationDevice {
    #[serde(rename = "DeviceID", default, deserialize_with = "lenient::integer")]
    pub device_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

/// `CheckDataSession/{id}` response body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceData {
    #[serde(default)]
    pub latest_data: LatestData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestData {
    #[serde(default)]
    pub ui_data: UiData,
    #[serde(default)]
    pub fan_data: FanData,
}

/// The thermostat's display state as the portal reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UiData {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub disp_temperature: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub display_units: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub indoor_humidity: Option<i64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub heat_setpoint: Option<i64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub cool_setpoint: Option<i64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub system_switch_position: Option<i64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub current_setpoint_status: Option<i64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub heat_next_period: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanData {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub fan_mode: Option<i64>,
}

/// A thermostat as listed and fetched from the portal, before domain mapping.
#[derive(Debug, Clone)]
pub struct RawThermostat {
    pub device_id: i64,
    pub name: Option<String>,
    pub ui: UiData,
    pub fan: FanData,
}

/// Body of `SubmitControlScreenChanges`.
///
/// The hold-period fields must serialize as `null` unless the schedule
/// is a temporary hold, otherwise the portal silently drops the command.
/// `StatusHeat` and `StatusCool` both carry the schedule code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControlChanges {
    #[serde(rename = "DeviceID")]
    pub device_id: i64,
    pub system_switch: i64,
    pub heat_setpoint: i64,
    pub cool_setpoint: i64,
    pub heat_next_period: Option<i64>,
    pub cool_next_period: Option<i64>,
    pub status_heat: i64,
    pub status_cool: i64,
    pub fan_mode: i64,
}

impl ControlChanges {
    pub fn new(
        device_id: i64,
        system_switch: i64,
        heat_setpoint: i64,
        cool_setpoint: i64,
        schedule: i64,
        hold_period: Option<i64>,
        fan_mode: i64,
    ) -> Self {
        Self {
            device_id,
            system_switch,
            heat_setpoint,
            cool_setpoint,
            heat_next_period: hold_period,
            cool_next_period: hold_period,
            status_heat: schedule,
            status_cool: schedule,
            fan_mode,
        }
    }
}

pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept integers, floats (truncated), and numeric strings.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn integer<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
        let value = Option::<Value>::deserialize(de)?;
        Ok(value.and_then(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        }))
    }

    /// Accept strings, and render scalars as text.
    pub fn text<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(de)?;
        Ok(value.and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }))
    }
}
