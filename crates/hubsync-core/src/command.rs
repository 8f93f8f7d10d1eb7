// ── Command system ──
//
// Host intents arrive as (channel, raw value) pairs. They are parsed
// once into a closed `Command`, and applying a command to a snapshot is
// a pure function producing the desired next snapshot.

use std::str::FromStr;

use chrono::NaiveTime;

use crate::error::CoreError;
use crate::host::channel;
use crate::model::{
    DeviceKind, DeviceState, FanMode, LEVEL_STEP, ScheduleMode, SystemMode, period_from_time,
};

/// Raw host value asking for a re-read instead of a change.
pub const REFRESH: &str = "REFRESH";

/// Direction of a relative brightness change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum LevelStep {
    #[strum(serialize = "INCREASE")]
    Increase,
    #[strum(serialize = "DECREASE")]
    Decrease,
}

/// A typed outbound intent for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetMode(SystemMode),
    SetHeatSetpoint(i64),
    SetCoolSetpoint(i64),
    SetFanMode(FanMode),
    SetSchedule(ScheduleMode),
    SetHoldUntil(NaiveTime),
    SetPower(bool),
    SetLevel(u8),
    StepLevel(LevelStep),
    Refresh,
}

impl Command {
    /// Parse a host intent addressed to `channel`.
    pub fn parse(channel_name: &str, raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(REFRESH) {
            return Ok(Self::Refresh);
        }

        match channel_name {
            channel::SYSTEM_MODE => parse_enum(channel_name, raw).map(Self::SetMode),
            channel::HEAT_SETPOINT => parse_number(channel_name, raw).map(Self::SetHeatSetpoint),
            channel::COOL_SETPOINT => parse_number(channel_name, raw).map(Self::SetCoolSetpoint),
            channel::FAN_MODE => parse_enum(channel_name, raw).map(Self::SetFanMode),
            channel::SCHEDULE_MODE => parse_enum(channel_name, raw).map(Self::SetSchedule),
            channel::HOLD_UNTIL => parse_time(raw).map(Self::SetHoldUntil),
            channel::POWER => parse_switch(raw).map(Self::SetPower),
            channel::LEVEL => parse_level(raw),
            other => Err(invalid(other, raw)),
        }
    }

    /// The device kind this command makes sense for, if it is kind-specific.
    pub fn target_kind(&self) -> Option<DeviceKind> {
        match self {
            Self::SetMode(_)
            | Self::SetHeatSetpoint(_)
            | Self::SetCoolSetpoint(_)
            | Self::SetFanMode(_)
            | Self::SetSchedule(_)
            | Self::SetHoldUntil(_) => Some(DeviceKind::Thermostat),
            Self::SetPower(_) | Self::SetLevel(_) | Self::StepLevel(_) => Some(DeviceKind::Light),
            Self::Refresh => None,
        }
    }
}

impl DeviceState {
    /// The desired state after `command`, leaving every other field untouched.
    pub fn apply(&self, command: &Command) -> Result<DeviceState, CoreError> {
        match (self, command) {
            (Self::Thermostat(current), cmd) if cmd.target_kind() == Some(DeviceKind::Thermostat) => {
                let mut next = current.clone();
                match *cmd {
                    Command::SetMode(mode) => next.system_mode = mode,
                    Command::SetHeatSetpoint(v) => next.heat_setpoint = v,
                    Command::SetCoolSetpoint(v) => next.cool_setpoint = v,
                    Command::SetFanMode(mode) => next.fan_mode = mode,
                    Command::SetSchedule(schedule) => next.schedule = schedule,
                    Command::SetHoldUntil(time) => next.hold_period = period_from_time(time),
                    _ => {}
                }
                Ok(Self::Thermostat(next))
            }
            (Self::Light(current), cmd) if cmd.target_kind() == Some(DeviceKind::Light) => {
                let mut next = *current;
                match *cmd {
                    Command::SetPower(on) => next.on = on,
                    Command::SetLevel(level) => {
                        next.level = level.min(100);
                        next.on = next.level > 0;
                    }
                    Command::StepLevel(step) => {
                        next.level = match step {
                            LevelStep::Increase => current.percent().saturating_add(LEVEL_STEP).min(100),
                            LevelStep::Decrease => current.percent().saturating_sub(LEVEL_STEP),
                        };
                        next.on = next.level > 0;
                    }
                    _ => {}
                }
                Ok(Self::Light(next))
            }
            (state, cmd) => Err(CoreError::ValidationFailed {
                message: format!("{cmd:?} does not apply to a {}", state.kind()),
            }),
        }
    }
}

// ── Parsing helpers ──────────────────────────────────────────────────

fn invalid(channel_name: &str, raw: &str) -> CoreError {
    CoreError::ValidationFailed {
        message: format!("cannot apply '{raw}' to channel '{channel_name}'"),
    }
}

fn parse_enum<T: FromStr>(channel_name: &str, raw: &str) -> Result<T, CoreError> {
    raw.parse().map_err(|_| invalid(channel_name, raw))
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn parse_number(channel_name: &str, raw: &str) -> Result<i64, CoreError> {
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        .ok_or_else(|| invalid(channel_name, raw))
}

fn parse_time(raw: &str) -> Result<NaiveTime, CoreError> {
    if let Ok(time) = NaiveTime::parse_from_str(raw, "%H:%M") {
        return Ok(time);
    }
    if let Ok(time) = NaiveTime::parse_from_str(raw, "%H:%M:%S") {
        return Ok(time);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.time())
        .map_err(|_| invalid(channel::HOLD_UNTIL, raw))
}

fn parse_switch(raw: &str) -> Result<bool, CoreError> {
    match raw.to_ascii_uppercase().as_str() {
        "ON" | "1" | "TRUE" => Ok(true),
        "OFF" | "0" | "FALSE" => Ok(false),
        _ => Err(invalid(channel::POWER, raw)),
    }
}

fn parse_level(raw: &str) -> Result<Command, CoreError> {
    if let Ok(step) = raw.parse::<LevelStep>() {
        return Ok(Command::StepLevel(step));
    }
    match raw.to_ascii_uppercase().as_str() {
        "ON" => return Ok(Command::SetLevel(100)),
        "OFF" => return Ok(Command::SetLevel(0)),
        _ => {}
    }
    let value = parse_number(channel::LEVEL, raw)?;
    u8::try_from(value.clamp(0, 100))
        .map(Command::SetLevel)
        .map_err(|_| invalid(channel::LEVEL, raw))
}
