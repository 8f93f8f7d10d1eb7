// Gateway command client
//
// One POST endpoint, one body convention. Pairing is the only call that
// runs without a token; everything else goes through `ensure_valid`.

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use secrecy::SecretString;
use tracing::{debug, info};
use xmltree::Element;

use crate::error::Error;
use crate::gateway::models::{self, RawLight};
use crate::gateway::session::GatewaySession;

/// Raw client for a LAN lighting gateway.
#[derive(Clone)]
pub struct GatewayClient {
    session: Arc<GatewaySession>,
}

impl GatewayClient {
    pub fn new(session: Arc<GatewaySession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<GatewaySession> {
        &self.session
    }

    /// Exchange a one-time seed for a gateway token and keep it in the session.
    ///
    /// The gateway only answers while its sync button is pressed; any other
    /// time the exchange fails with a non-200 return code.
    pub async fn pair_and_issue_token(&self, seed: &str) -> Result<SecretString, Error> {
        let http = self.session.http()?;
        let (root, body) = self.post(&http, models::login_body(seed)).await?;
        let token = models::parse_token(&root, &body)?;
        self.session.set_token(token.clone());
        info!("gateway paired");
        Ok(token)
    }

    /// All lights known to the gateway, in the gateway's room order.
    pub async fn list_lights(&self) -> Result<Vec<RawLight>, Error> {
        let auth = self.session.ensure_valid()?;
        let (root, _) = self.post(&auth.http, models::carousel_body(&auth.token)).await?;
        let lights = models::parse_lights(&root);
        debug!(count = lights.len(), "gateway listed lights");
        Ok(lights)
    }

    /// Find one light by device id.
    pub async fn light(&self, did: &str) -> Result<Option<RawLight>, Error> {
        Ok(self.list_lights().await?.into_iter().find(|l| l.did == did))
    }

    pub async fn set_power(&self, did: &str, on: bool) -> Result<(), Error> {
        let auth = self.session.ensure_valid()?;
        debug!(did, on, "setting light power");
        self.post(&auth.http, models::power_body(&auth.token, did, on))
            .await
            .map(drop)
    }

    pub async fn set_level(&self, did: &str, level: u8) -> Result<(), Error> {
        let auth = self.session.ensure_valid()?;
        let level = level.min(100);
        debug!(did, level, "setting light level");
        self.post(&auth.http, models::level_body(&auth.token, did, level))
            .await
            .map(drop)
    }

    async fn post(&self, http: &reqwest::Client, command: String) -> Result<(Element, String), Error> {
        let resp = http
            .post(self.session.endpoint().clone())
            .header(CONTENT_TYPE, "application/xml")
            .body(command)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let root = models::parse_response(&body)?;
        Ok((root, body))
    }
}
