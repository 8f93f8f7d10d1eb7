// ── Core error types ──
//
// Domain errors from hubsync-core. Consumers never see HTTP status
// codes or XML parse failures directly; `From<hubsync_api::Error>`
// folds wire errors into the auth / communication split that drives
// retry policy and host status.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    /// Bad credentials, a rejected session whose re-login failed, or an
    /// unpaired gateway. Usually needs user action.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Communication ────────────────────────────────────────────────
    /// Network failure, unexpected HTTP status, or an undecodable payload.
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// HTTP 200 without the expected success marker.
    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {id}")]
    DeviceNotFound { id: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Bridge has been disposed")]
    BridgeDisposed,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Credentials or pairing problem: retry on the long fixed delay.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    /// Transient remote problem: retry with backoff.
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            Self::Communication { .. } | Self::ProtocolViolation { .. } | Self::DeviceNotFound { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hubsync_api::Error> for CoreError {
    fn from(err: hubsync_api::Error) -> Self {
        use hubsync_api::Error as Api;

        match err {
            Api::Authentication { message } => Self::AuthenticationFailed { message },
            Api::NotPaired => Self::AuthenticationFailed {
                message: "Gateway not paired -- press the sync button on the gateway".into(),
            },
            Api::Transport(e) => Self::Communication {
                message: e.to_string(),
            },
            Api::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(message) => Self::Communication {
                message: format!("TLS error: {message}"),
            },
            Api::Status { status, .. } => Self::Communication {
                message: format!("unexpected HTTP status {status}"),
            },
            Api::Protocol { message, .. } => Self::ProtocolViolation { message },
            Api::Deserialization { message, .. } => Self::Communication {
                message: format!("malformed payload: {message}"),
            },
            Api::Xml(e) => Self::Communication {
                message: format!("malformed XML: {e}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_errors_split_into_auth_and_communication() {
        let auth: CoreError = hubsync_api::Error::NotPaired.into();
        assert!(auth.is_auth());

        let status: CoreError = hubsync_api::Error::Status {
            status: 503,
            body: String::new(),
        }
        .into();
        assert!(status.is_communication());

        let protocol: CoreError = hubsync_api::Error::Protocol {
            message: "no marker".into(),
            body: "{\"success\":0}".into(),
        }
        .into();
        assert!(matches!(protocol, CoreError::ProtocolViolation { .. }));
        assert!(protocol.is_communication());
    }
}
