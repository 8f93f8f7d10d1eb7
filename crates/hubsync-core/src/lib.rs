//! Device synchronization core between `hubsync-api` and an automation host.
//!
//! One bridge is one remote service (a thermostat portal account or a LAN
//! lighting gateway). For each bridge this crate provides:
//!
//! - **[`DeviceRegistry`]**: owns the poll task. It activates the
//!   [`DeviceTransport`], lists devices on a fixed interval, diffs each
//!   listing against the last one and delivers `Added` / `Changed` /
//!   `Removed` events. Communication failures back off linearly; the
//!   bridge state is observable through a `watch` channel.
//!
//! - **[`ListenerBus`]**: copy-on-write subscriber list the registry
//!   delivers to. Subscribers are plain [`Subscriber`] trait objects;
//!   [`QueueSubscriber`] adapts the bus to an `mpsc` queue.
//!
//! - **[`DeviceProxy`]**: host-side view of one device. Publishes every
//!   property through a [`HostSink`] and applies host [`Command`]s
//!   optimistically.
//!
//! - **[`DiscoveryService`]**: turns `Added` events into
//!   [`DiscoveryResult`]s.
//!
//! - **Domain model** ([`model`]): `Device`, `DeviceState` and the
//!   thermostat / light state types shared by both bridge flavors.

pub mod bus;
pub mod command;
pub mod config;
pub mod convert;
pub mod discovery;
pub mod error;
pub mod host;
pub mod model;
pub mod proxy;
pub mod registry;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{DeviceEvent, ListenerBus, QueueSubscriber, Subscriber};
pub use command::{Command, LevelStep};
pub use config::{BridgeConfig, BridgeKind, TlsVerification};
pub use discovery::{DiscoveryResult, DiscoveryService};
pub use error::CoreError;
pub use host::{HostSink, PropertyValue, StatusDetail, StatusUpdate, ThingStatus};
pub use proxy::{CommandOutcome, DeviceProxy};
pub use registry::{BridgeState, DeviceRegistry};
pub use transport::{
    DeviceTransport, GatewayTransport, PairedCredentials, PortalTransport, transport_for,
};

pub use model::{
    BridgeId, Device, DeviceId, DeviceKind, DeviceState, FanMode, LightState, ScheduleMode,
    SystemMode, ThermostatState,
};
