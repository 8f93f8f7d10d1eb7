// ── Portal transport ──

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use hubsync_api::transport::TransportConfig;
use hubsync_api::{PortalClient, PortalSession};

use super::DeviceTransport;
use crate::convert::{control_changes, portal_device_id};
use crate::error::CoreError;
use crate::model::{Device, DeviceId, DeviceKind, DeviceState, ThermostatState};

/// Thermostats behind one portal account.
pub struct PortalTransport {
    client: PortalClient,
}

impl PortalTransport {
    pub fn new(url: Url, username: String, password: SecretString, transport: TransportConfig) -> Self {
        let session = PortalSession::new(url, username, password, transport.with_pinned_tls12());
        Self::from_client(PortalClient::new(Arc::new(session)))
    }

    pub fn from_client(client: PortalClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &PortalClient {
        &self.client
    }
}

#[async_trait]
impl DeviceTransport for PortalTransport {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Thermostat
    }

    async fn activate(&self) -> Result<(), CoreError> {
        self.client.session().ensure_valid().await?;
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        let thermostats = self.client.list_thermostats().await?;
        Ok(thermostats.iter().map(Device::from).collect())
    }

    async fn fetch_device(&self, id: &DeviceId) -> Result<DeviceState, CoreError> {
        let raw = self.client.thermostat(portal_device_id(id)?, None).await?;
        Ok(DeviceState::Thermostat(ThermostatState::from(&raw)))
    }

    async fn submit_change(
        &self,
        id: &DeviceId,
        _previous: &DeviceState,
        desired: &DeviceState,
    ) -> Result<(), CoreError> {
        let DeviceState::Thermostat(desired) = desired else {
            return Err(CoreError::ValidationFailed {
                message: format!("portal cannot submit a {} state", desired.kind()),
            });
        };

        let body = control_changes(portal_device_id(id)?, desired);
        debug!(device = %id, "submitting thermostat change");
        self.client.submit_changes(&body).await?;
        Ok(())
    }

    async fn dispose(&self) {
        self.client.session().dispose().await;
    }
}
