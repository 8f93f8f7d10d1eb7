// ── Gateway transport ──
//
// Lights behind one LAN gateway. Activation pairs when no token is
// held and publishes the issued credentials so the host can persist
// them. Submissions send only the commands the state change needs.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use hubsync_api::transport::TransportConfig;
use hubsync_api::{GatewayClient, GatewaySession};

use super::DeviceTransport;
use crate::error::CoreError;
use crate::model::{Device, DeviceId, DeviceKind, DeviceState, LightState};

/// Credentials issued by a successful pairing.
#[derive(Debug, Clone)]
pub struct PairedCredentials {
    pub token: SecretString,
    /// The random seed the token was issued for.
    pub access_key: String,
}

pub struct GatewayTransport {
    client: GatewayClient,
    paired: watch::Sender<Option<PairedCredentials>>,
}

impl GatewayTransport {
    pub fn new(
        host: &str,
        token: Option<SecretString>,
        transport: TransportConfig,
    ) -> Result<Self, CoreError> {
        let session = GatewaySession::new(host, token, transport)?;
        Ok(Self::from_client(GatewayClient::new(Arc::new(session))))
    }

    pub fn from_client(client: GatewayClient) -> Self {
        let (paired, _) = watch::channel(None);
        Self { client, paired }
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    /// Observe credentials issued by pairing.
    pub fn subscribe_pairing(&self) -> watch::Receiver<Option<PairedCredentials>> {
        self.paired.subscribe()
    }
}

fn light_state(state: &DeviceState) -> Result<&LightState, CoreError> {
    state.as_light().ok_or_else(|| CoreError::ValidationFailed {
        message: format!("gateway cannot submit a {} state", state.kind()),
    })
}

#[async_trait]
impl DeviceTransport for GatewayTransport {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Light
    }

    async fn activate(&self) -> Result<(), CoreError> {
        if self.client.session().is_paired() {
            return Ok(());
        }
        let seed = Uuid::new_v4().to_string();
        self.pair_and_issue_token(&seed).await?;
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        let lights = self.client.list_lights().await?;
        Ok(lights.iter().map(Device::from).collect())
    }

    async fn fetch_device(&self, id: &DeviceId) -> Result<DeviceState, CoreError> {
        let light = self
            .client
            .light(id.as_str())
            .await?
            .ok_or_else(|| CoreError::DeviceNotFound { id: id.to_string() })?;
        Ok(DeviceState::Light(LightState::from(&light)))
    }

    async fn submit_change(
        &self,
        id: &DeviceId,
        previous: &DeviceState,
        desired: &DeviceState,
    ) -> Result<(), CoreError> {
        let previous = light_state(previous)?;
        let desired = light_state(desired)?;

        if desired.on != previous.on {
            self.client.set_power(id.as_str(), desired.on).await?;
        }
        if desired.on && desired.level != previous.percent() {
            self.client.set_level(id.as_str(), desired.level).await?;
        }
        if desired.on == previous.on && desired.percent() == previous.percent() {
            debug!(device = %id, "light already in desired state");
        }
        Ok(())
    }

    async fn pair_and_issue_token(&self, seed: &str) -> Result<SecretString, CoreError> {
        let token = self.client.pair_and_issue_token(seed).await.map_err(|e| {
            if e.is_protocol_violation() {
                CoreError::AuthenticationFailed {
                    message: "gateway refused pairing -- press the sync button on the gateway".into(),
                }
            } else {
                e.into()
            }
        })?;

        info!("gateway issued a new token");
        self.paired.send_replace(Some(PairedCredentials {
            token: token.clone(),
            access_key: seed.to_owned(),
        }));
        Ok(token)
    }

    async fn dispose(&self) {
        self.client.session().dispose();
    }
}
