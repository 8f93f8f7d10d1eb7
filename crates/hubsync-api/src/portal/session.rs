// Portal session management
//
// Cookie-based login against the thermostat portal. The session is
// created lazily, probed before every operation, and rebuilt at most
// once per rejected generation. Two callers that both see a 401 on the
// same generation share a single re-login.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// The portal answers failed logins with HTTP 200 and this text in the page.
pub const LOGIN_FAILURE_MARKER: &str = "Login was unsuccessful.";

const LOGIN_PATH: &str = "/portal/";
const PROBE_PATH: &str = "/portal/Locations/";

/// An authenticated HTTP handle tagged with the login that produced it.
#[derive(Clone)]
struct SessionHandle {
    http: reqwest::Client,
    generation: u64,
}

enum Probe {
    Valid,
    Rejected,
}

/// Authenticated session against the thermostat portal.
///
/// Owned by one bridge; never shared across bridges. All portal
/// operations go through [`ensure_valid`](Self::ensure_valid).
pub struct PortalSession {
    base_url: Url,
    username: String,
    password: SecretString,
    transport: TransportConfig,
    handle: Mutex<Option<SessionHandle>>,
    generation: AtomicU64,
}

impl PortalSession {
    pub fn new(
        base_url: Url,
        username: String,
        password: SecretString,
        transport: TransportConfig,
    ) -> Self {
        Self {
            base_url,
            username,
            password,
            transport,
            handle: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// The portal root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Number of successful logins performed so far.
    pub fn login_count(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Build an absolute URL for a portal path.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Error::InvalidUrl)
    }

    // ── Validity ─────────────────────────────────────────────────────

    /// Return an HTTP handle that the portal currently accepts.
    ///
    /// Logs in if no handle exists. Otherwise probes the locations page;
    /// a 401 discards the handle and logs in exactly once more. Any other
    /// non-success status is a communication problem and leaves the
    /// session alone.
    pub async fn ensure_valid(&self) -> Result<reqwest::Client, Error> {
        self.validated().await.map(|(http, _)| http)
    }

    /// [`ensure_valid`](Self::ensure_valid), plus the login generation the
    /// handle belongs to.
    pub(crate) async fn validated(&self) -> Result<(reqwest::Client, u64), Error> {
        let current = self.current_or_login().await?;
        if let Probe::Valid = self.probe(&current.http).await? {
            return Ok((current.http, current.generation));
        }

        info!(generation = current.generation, "portal session rejected, re-authenticating");
        let fresh = self.relogin_after(current.generation).await?;
        match self.probe(&fresh.http).await? {
            Probe::Valid => Ok((fresh.http, fresh.generation)),
            Probe::Rejected => {
                warn!("portal rejected a freshly established session");
                self.discard(fresh.generation).await;
                Err(Error::Authentication {
                    message: "session rejected immediately after login".into(),
                })
            }
        }
    }

    /// Replace a handle an operation saw rejected with 401.
    ///
    /// Logs in again unless a concurrent caller already replaced `stale`.
    pub(crate) async fn reauthenticate(&self, stale: u64) -> Result<(reqwest::Client, u64), Error> {
        info!(generation = stale, "portal rejected an operation, re-authenticating");
        let fresh = self.relogin_after(stale).await?;
        Ok((fresh.http, fresh.generation))
    }

    /// Perform a fresh login, replacing any existing handle.
    pub async fn login(&self) -> Result<(), Error> {
        let mut slot = self.handle.lock().await;
        *slot = None;
        let handle = self.login_locked().await?;
        *slot = Some(handle);
        Ok(())
    }

    /// Release the HTTP handle. Safe to call any number of times.
    pub async fn dispose(&self) {
        if self.handle.lock().await.take().is_some() {
            debug!("portal session disposed");
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn current_or_login(&self) -> Result<SessionHandle, Error> {
        let mut slot = self.handle.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }
        let handle = self.login_locked().await?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Re-login unless another caller already replaced `stale`.
    async fn relogin_after(&self, stale: u64) -> Result<SessionHandle, Error> {
        let mut slot = self.handle.lock().await;
        if let Some(handle) = slot.as_ref().filter(|h| h.generation != stale) {
            debug!(generation = handle.generation, "adopting session from concurrent re-login");
            return Ok(handle.clone());
        }
        *slot = None;
        let handle = self.login_locked().await?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Drop the handle if it still belongs to `generation`.
    pub(crate) async fn discard(&self, generation: u64) {
        let mut slot = self.handle.lock().await;
        if slot.as_ref().is_some_and(|h| h.generation == generation) {
            *slot = None;
        }
    }

    /// Build a client with a fresh cookie jar and submit the login form.
    ///
    /// Caller must hold the handle lock so concurrent logins serialize.
    async fn login_locked(&self) -> Result<SessionHandle, Error> {
        let http = self.transport.clone().with_cookie_jar().build_client()?;
        let url = self.url(LOGIN_PATH)?;

        debug!(username = %self.username, "logging in at {}", url);

        let form = [
            ("timeOffset", "0"),
            ("UserName", self.username.as_str()),
            ("Password", self.password.expose_secret()),
        ];

        let resp = http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        if body.contains(LOGIN_FAILURE_MARKER) {
            return Err(Error::Authentication {
                message: "portal rejected the username or password".into(),
            });
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "login successful");
        Ok(SessionHandle { http, generation })
    }

    async fn probe(&self, http: &reqwest::Client) -> Result<Probe, Error> {
        let resp = http
            .get(self.url(PROBE_PATH)?)
            .send()
            .await
            .map_err(Error::Transport)?;

        match resp.status() {
            StatusCode::UNAUTHORIZED => Ok(Probe::Rejected),
            status if status.is_success() => Ok(Probe::Valid),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
