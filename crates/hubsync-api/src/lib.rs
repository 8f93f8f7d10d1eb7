// hubsync-api: Async clients for the thermostat cloud portal and the LAN lighting gateway

pub mod error;
pub mod gateway;
pub mod portal;
pub mod transport;

pub use error::Error;
pub use gateway::{GatewayClient, GatewaySession, RawLight};
pub use portal::{ControlChanges, PortalClient, PortalSession, RawThermostat};
pub use transport::{TlsMode, TransportConfig};
