// ── Runtime bridge configuration ──
//
// These types describe how to reach one bridge and how often to poll it.
// They carry credential data but never touch disk; hubsync-config builds
// a `BridgeConfig` from a profile and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::model::BridgeId;

pub const DEFAULT_PORTAL_URL: &str = "https://mytotalconnectcomfort.com";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// A LAN gateway is cheap to retry; pairing waits on a button press.
pub const GATEWAY_RETRY_DELAY: Duration = Duration::from_secs(15);
pub const GATEWAY_PRESENCE_INTERVAL: Duration = Duration::from_secs(60);

/// Which remote service a bridge talks to, with its credentials.
#[derive(Debug, Clone)]
pub enum BridgeKind {
    /// Thermostat cloud portal (cookie login).
    Portal {
        url: Url,
        username: String,
        password: SecretString,
    },
    /// LAN lighting gateway (pairing token).
    Gateway {
        host: String,
        token: Option<SecretString>,
    },
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store. Default for the cloud portal.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification. Gateways always use this.
    DangerAcceptInvalid,
}

/// Configuration for one bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub id: BridgeId,
    pub kind: BridgeKind,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Fixed delay between successful polls.
    pub poll_interval: Duration,
    /// Delay before retrying activation or an auth failure.
    pub retry_delay: Duration,
    /// Emit `Removed` for devices missing from a poll.
    pub emit_removals: bool,
    /// How often device proxies re-check that the bridge still reports them.
    pub presence_interval: Option<Duration>,
}

impl BridgeConfig {
    pub fn portal(
        id: impl Into<String>,
        url: Url,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self::new(
            id,
            BridgeKind::Portal {
                url,
                username: username.into(),
                password,
            },
        )
    }

    pub fn gateway(id: impl Into<String>, host: impl Into<String>, token: Option<SecretString>) -> Self {
        Self {
            tls: TlsVerification::DangerAcceptInvalid,
            retry_delay: GATEWAY_RETRY_DELAY,
            presence_interval: Some(GATEWAY_PRESENCE_INTERVAL),
            ..Self::new(
                id,
                BridgeKind::Gateway {
                    host: host.into(),
                    token,
                },
            )
        }
    }

    pub fn new(id: impl Into<String>, kind: BridgeKind) -> Self {
        Self {
            id: BridgeId::new(id),
            kind,
            tls: TlsVerification::default(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
            emit_removals: false,
            presence_interval: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_emit_removals(mut self, emit: bool) -> Self {
        self.emit_removals = emit;
        self
    }
}
