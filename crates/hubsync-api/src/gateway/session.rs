// Gateway session
//
// The lighting gateway has no login: a pairing exchange issues a token
// that every later command carries inline. The session owns that token
// and a lazily built HTTP handle that accepts the gateway's self-signed
// certificate.

use std::sync::{Mutex, PoisonError, RwLock};

use secrecy::SecretString;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const GATEWAY_PATH: &str = "/gwr/gop.php";

/// A validated handle plus the token to embed in the request body.
#[derive(Clone)]
pub struct Authorized {
    pub http: reqwest::Client,
    pub token: SecretString,
}

/// Token-based session against one LAN gateway.
pub struct GatewaySession {
    endpoint: Url,
    transport: TransportConfig,
    http: Mutex<Option<reqwest::Client>>,
    token: RwLock<Option<SecretString>>,
}

impl GatewaySession {
    /// Session for `https://{host}/gwr/gop.php`.
    pub fn new(host: &str, token: Option<SecretString>, transport: TransportConfig) -> Result<Self, Error> {
        let base = Url::parse(&format!("https://{host}"))?;
        Self::with_base_url(&base, token, transport)
    }

    /// Session against an explicit base URL (plain HTTP in tests).
    pub fn with_base_url(
        base: &Url,
        token: Option<SecretString>,
        transport: TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            endpoint: base.join(GATEWAY_PATH)?,
            transport: transport.accept_invalid_certs(),
            http: Mutex::new(None),
            token: RwLock::new(token),
        })
    }

    /// The command endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn is_paired(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The current token, if paired.
    pub fn token(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_token(&self, token: SecretString) {
        debug!("storing gateway token");
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Return the HTTP handle and token, or `NotPaired` without touching the network.
    pub fn ensure_valid(&self) -> Result<Authorized, Error> {
        let token = self.token().ok_or(Error::NotPaired)?;
        Ok(Authorized {
            http: self.http()?,
            token,
        })
    }

    /// The HTTP handle, built on first use. Pairing needs it before a token exists.
    pub(crate) fn http(&self) -> Result<reqwest::Client, Error> {
        let mut slot = self.http.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(http) = slot.as_ref() {
            return Ok(http.clone());
        }
        let http = self.transport.build_client()?;
        *slot = Some(http.clone());
        Ok(http)
    }

    /// Drop the HTTP handle. The token survives so a later call can resume.
    pub fn dispose(&self) {
        if self
            .http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!("gateway session disposed");
        }
    }
}
