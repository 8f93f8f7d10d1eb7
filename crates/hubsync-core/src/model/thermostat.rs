// ── Thermostat domain types ──
//
// Portal mode codes are small integers. Codes this crate does not know
// survive as `Unknown(code)` so a state read from the portal can be
// submitted back unchanged.

use std::fmt;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Minutes per hold period tick.
pub const HOLD_PERIOD_MINUTES: i64 = 15;

/// HVAC system switch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SystemMode {
    #[strum(serialize = "HEAT")]
    Heat,
    #[strum(serialize = "OFF")]
    Off,
    #[strum(serialize = "COOL")]
    Cool,
    #[strum(disabled)]
    Unknown(i64),
}

impl SystemMode {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Heat,
            2 => Self::Off,
            3 => Self::Cool,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Heat => 1,
            Self::Off => 2,
            Self::Cool => 3,
            Self::Unknown(code) => code,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "HEAT",
            Self::Off => "OFF",
            Self::Cool => "COOL",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Fan switch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum FanMode {
    #[strum(serialize = "AUTO")]
    Auto,
    #[strum(serialize = "ON")]
    On,
    #[strum(serialize = "CIRCULATE")]
    Circulate,
    #[strum(serialize = "SCHEDULE")]
    Schedule,
    #[strum(disabled)]
    Unknown(i64),
}

impl FanMode {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Auto,
            1 => Self::On,
            2 => Self::Circulate,
            3 => Self::Schedule,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Auto => 0,
            Self::On => 1,
            Self::Circulate => 2,
            Self::Schedule => 3,
            Self::Unknown(code) => code,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::On => "ON",
            Self::Circulate => "CIRCULATE",
            Self::Schedule => "SCHEDULE",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Whether the thermostat follows its program or holds a setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ScheduleMode {
    #[strum(serialize = "SCHEDULE")]
    Schedule,
    #[strum(serialize = "TEMP_HOLD")]
    TemporaryHold,
    #[strum(serialize = "PERM_HOLD")]
    PermanentHold,
    #[strum(disabled)]
    Unknown(i64),
}

impl ScheduleMode {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Schedule,
            1 => Self::TemporaryHold,
            2 => Self::PermanentHold,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Schedule => 0,
            Self::TemporaryHold => 1,
            Self::PermanentHold => 2,
            Self::Unknown(code) => code,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schedule => "SCHEDULE",
            Self::TemporaryHold => "TEMP_HOLD",
            Self::PermanentHold => "PERM_HOLD",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for SystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ThermostatState ──────────────────────────────────────────────────

/// Everything the portal reports about one thermostat.
///
/// `hold_period` counts 15-minute ticks since local midnight; it is the
/// portal's representation and the only one stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThermostatState {
    pub temperature: i64,
    pub humidity: i64,
    pub system_mode: SystemMode,
    pub heat_setpoint: i64,
    pub cool_setpoint: i64,
    pub fan_mode: FanMode,
    pub schedule: ScheduleMode,
    pub hold_period: i64,
    pub display_units: String,
}

impl Default for ThermostatState {
    fn default() -> Self {
        Self {
            temperature: 70,
            humidity: 35,
            system_mode: SystemMode::Off,
            heat_setpoint: 70,
            cool_setpoint: 70,
            fan_mode: FanMode::Schedule,
            schedule: ScheduleMode::Schedule,
            hold_period: 0,
            display_units: String::new(),
        }
    }
}

impl ThermostatState {
    /// The hold period to submit: only meaningful during a temporary hold.
    pub fn submitted_hold_period(&self) -> Option<i64> {
        (self.schedule == ScheduleMode::TemporaryHold).then_some(self.hold_period)
    }

    /// Absolute hold expiry on `date`, in local time.
    pub fn hold_expiry_on(&self, date: NaiveDate) -> Option<DateTime<Local>> {
        hold_expiry(self.hold_period, date)
    }
}

/// Period count for a wall-clock time: `hour * 4 + minute / 15`.
pub fn period_from_time(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 4 + i64::from(time.minute()) / HOLD_PERIOD_MINUTES
}

/// Local midnight of `date` plus `periods` ticks of 15 minutes.
pub fn hold_expiry(periods: i64, date: NaiveDate) -> Option<DateTime<Local>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    let offset = Duration::try_minutes(periods.checked_mul(HOLD_PERIOD_MINUTES)?)?;
    let naive = midnight.checked_add_signed(offset)?;
    Local.from_local_datetime(&naive).earliest()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn codes_round_trip_including_unknown() {
        assert_eq!(SystemMode::from_code(3), SystemMode::Cool);
        assert_eq!(SystemMode::from_code(9).code(), 9);
        assert_eq!(FanMode::from_code(2), FanMode::Circulate);
        assert_eq!(ScheduleMode::from_code(-1), ScheduleMode::Unknown(-1));
        assert_eq!(ScheduleMode::Unknown(-1).to_string(), "UNKNOWN");
    }

    #[test]
    fn host_names_parse_case_insensitively() {
        assert_eq!(SystemMode::from_str("cool").unwrap(), SystemMode::Cool);
        assert_eq!(ScheduleMode::from_str("TEMP_HOLD").unwrap(), ScheduleMode::TemporaryHold);
        assert!(FanMode::from_str("UNKNOWN").is_err());
    }

    #[test]
    fn period_rounds_down_to_quarter_hour() {
        assert_eq!(period_from_time(NaiveTime::from_hms_opt(17, 44, 0).unwrap()), 70);
        assert_eq!(period_from_time(NaiveTime::from_hms_opt(0, 14, 59).unwrap()), 0);
    }

    #[test]
    fn hold_expiry_is_midnight_plus_ticks() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let expiry = hold_expiry(70, date).unwrap();
        assert_eq!(expiry.date_naive(), date);
        assert_eq!((expiry.hour(), expiry.minute()), (17, 30));
    }

    #[test]
    fn hold_period_only_submitted_during_temporary_hold() {
        let mut state = ThermostatState {
            hold_period: 40,
            ..ThermostatState::default()
        };
        assert_eq!(state.submitted_hold_period(), None);
        state.schedule = ScheduleMode::TemporaryHold;
        assert_eq!(state.submitted_hold_period(), Some(40));
    }
}
