use thiserror::Error;

/// Top-level error type for the `hubsync-api` crate.
///
/// Covers every failure mode of both wire flavors: portal login and
/// session probing, gateway token exchange, HTTP transport, and payload
/// decoding. `hubsync-core` maps these into the auth/communication split
/// the poller acts on.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, failure marker in the body, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The gateway has no token yet; pairing must happen first.
    #[error("Gateway not paired -- press the sync button and retry")]
    NotPaired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status outside the login flow.
    #[error("Unexpected HTTP status {status}")]
    Status { status: u16, body: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// HTTP 200 but the body lacks the expected success marker.
    #[error("Protocol violation: {message}")]
    Protocol { message: String, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// XML payload could not be parsed.
    #[error("XML parse error: {0}")]
    Xml(#[from] xmltree::ParseError),
}

impl Error {
    /// Returns `true` if this error indicates auth has expired or was
    /// refused, and only new credentials or a re-login might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::NotPaired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the remote side answered 200 without its success marker.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}
