// ── Domain model ──
//
// Canonical device types shared by both vendor flavors.

pub mod device;
pub mod device_id;
pub mod light;
pub mod thermostat;

pub use device::{Device, DeviceKind, DeviceState};
pub use device_id::{BridgeId, DeviceId};
pub use light::{LEVEL_STEP, LightState};
pub use thermostat::{
    FanMode, HOLD_PERIOD_MINUTES, ScheduleMode, SystemMode, ThermostatState, hold_expiry,
    period_from_time,
};
