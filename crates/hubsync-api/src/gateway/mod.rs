// LAN lighting gateway: token pairing, carousel listing, power and level commands

pub mod client;
pub mod models;
pub mod session;

pub use client::GatewayClient;
pub use models::RawLight;
pub use session::{Authorized, GatewaySession};
