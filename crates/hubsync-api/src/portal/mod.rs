// Thermostat cloud portal: cookie session, device listing, control submission

pub mod client;
pub mod models;
pub mod session;

pub use client::PortalClient;
pub use models::{ControlChanges, DeviceData, FanData, Location, LocationDevice, RawThermostat, UiData};
pub use session::{LOGIN_FAILURE_MARKER, PortalSession};
