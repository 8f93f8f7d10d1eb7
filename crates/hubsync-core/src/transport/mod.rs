// ── Device transport ──
//
// Typed device operations over one bridge's remote session. The registry
// and the proxies only ever see `dyn DeviceTransport`; the portal and
// gateway adapters translate between domain snapshots and wire calls.

mod gateway;
mod portal;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use hubsync_api::transport::{TlsMode, TransportConfig};

use crate::config::{BridgeConfig, BridgeKind, TlsVerification};
use crate::error::CoreError;
use crate::model::{Device, DeviceId, DeviceKind, DeviceState};

pub use gateway::{GatewayTransport, PairedCredentials};
pub use portal::PortalTransport;

/// Operations a bridge exposes for its devices.
///
/// Every call validates the remote session first and fails with
/// `AuthenticationFailed` before touching any device endpoint.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// The kind of device this bridge serves.
    fn kind(&self) -> DeviceKind;

    /// Establish the session: log in, or pair if no token is held.
    async fn activate(&self) -> Result<(), CoreError>;

    /// Current devices in remote order.
    async fn list_devices(&self) -> Result<Vec<Device>, CoreError>;

    /// Current state of one device.
    async fn fetch_device(&self, id: &DeviceId) -> Result<DeviceState, CoreError>;

    /// Send whatever it takes to move `id` from `previous` to `desired`.
    async fn submit_change(
        &self,
        id: &DeviceId,
        previous: &DeviceState,
        desired: &DeviceState,
    ) -> Result<(), CoreError>;

    /// One-time token exchange; only gateways support it.
    async fn pair_and_issue_token(&self, _seed: &str) -> Result<SecretString, CoreError> {
        Err(CoreError::Unsupported {
            operation: "pair_and_issue_token".into(),
        })
    }

    /// Release the session. Idempotent.
    async fn dispose(&self);
}

/// Build the transport matching a bridge's configuration.
pub fn transport_for(config: &BridgeConfig) -> Result<Arc<dyn DeviceTransport>, CoreError> {
    let transport = build_transport(config);
    match &config.kind {
        BridgeKind::Portal {
            url,
            username,
            password,
        } => Ok(Arc::new(PortalTransport::new(
            url.clone(),
            username.clone(),
            password.clone(),
            transport,
        ))),
        BridgeKind::Gateway { host, token } => Ok(Arc::new(GatewayTransport::new(
            host,
            token.clone(),
            transport,
        )?)),
    }
}

fn build_transport(config: &BridgeConfig) -> TransportConfig {
    TransportConfig {
        tls: match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
        ..TransportConfig::default()
    }
}
