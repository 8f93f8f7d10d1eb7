// Shared transport configuration for building reqwest::Client instances.
//
// The portal and gateway sessions share TLS, timeout, and cookie
// settings through this module. Every portal login builds a brand new
// client with a fresh jar, so the builder is cheap to re-run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::tls::Version;

use crate::error::Error;

const USER_AGENT: &str = concat!("hubsync/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (LAN gateways ship self-signed certs).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    pub cookie_jar: Option<Arc<Jar>>,
    /// Pin the negotiated protocol to this exact TLS version.
    pub tls_version: Option<Version>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            cookie_jar: None,
            tls_version: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        if let Some(version) = self.tls_version {
            builder = builder.min_tls_version(version).max_tls_version(version);
        }

        if let Some(ref jar) = self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Create a config with a fresh cookie jar (for session auth).
    pub fn with_cookie_jar(mut self) -> Self {
        self.cookie_jar = Some(Arc::new(Jar::default()));
        self
    }

    /// Pin the handshake to TLS 1.2, which the thermostat portal negotiates reliably.
    pub fn with_pinned_tls12(mut self) -> Self {
        self.tls_version = Some(Version::TLS_1_2);
        self
    }

    /// Accept self-signed gateway certificates.
    pub fn accept_invalid_certs(mut self) -> Self {
        self.tls = TlsMode::DangerAcceptInvalid;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_cookie_jar_always_creates_a_new_jar() {
        let first = TransportConfig::default().with_cookie_jar();
        let second = first.clone().with_cookie_jar();

        let a = first.cookie_jar.as_ref().map(Arc::as_ptr);
        let b = second.cookie_jar.as_ref().map(Arc::as_ptr);
        assert!(a.is_some());
        assert_ne!(a, b);
    }

    #[test]
    fn default_client_builds() {
        assert!(TransportConfig::default().build_client().is_ok());
    }

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let config = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/ca.pem")),
            ..TransportConfig::default()
        };
        assert!(matches!(config.build_client(), Err(Error::Tls(_))));
    }
}
