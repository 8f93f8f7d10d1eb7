//! Bridge configuration for hubsync hosts.
//!
//! TOML bridge profiles, credential resolution (env + keyring + plaintext),
//! and translation to `hubsync_core::BridgeConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hubsync_core::config::DEFAULT_PORTAL_URL;
use hubsync_core::{BridgeConfig, TlsVerification};

const KEYRING_SERVICE: &str = "hubsync";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for bridge '{bridge}'")]
    NoCredentials { bridge: String },

    #[error("no bridge named '{bridge}'")]
    UnknownBridge { bridge: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Values a bridge profile falls back to.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named bridges.
    #[serde(default)]
    pub bridges: HashMap<String, BridgeProfile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Seconds between polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds to wait after an authentication failure.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            timeout: default_timeout(),
            retry_delay: default_retry_delay(),
        }
    }
}

fn default_poll_interval() -> u64 {
    30
}
fn default_timeout() -> u64 {
    30
}
fn default_retry_delay() -> u64 {
    60
}

/// Which service a bridge profile describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Portal,
    Gateway,
}

/// A named bridge.
#[derive(Debug, Deserialize, Serialize)]
pub struct BridgeProfile {
    pub kind: ProfileKind,

    /// Portal base URL; defaults to the public portal.
    pub url: Option<String>,

    /// Portal account name.
    pub username: Option<String>,

    /// Portal password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the portal password.
    pub password_env: Option<String>,

    /// Gateway host name or address.
    pub host: Option<String>,

    /// Gateway token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable holding the gateway token.
    pub token_env: Option<String>,

    /// Seed the gateway token was issued for.
    pub access_key: Option<String>,

    pub poll_interval: Option<u64>,
    pub retry_delay: Option<u64>,
    pub timeout: Option<u64>,

    /// Seconds between device presence checks; 0 disables them.
    pub presence_interval: Option<u64>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Skip certificate verification.
    pub insecure: Option<bool>,

    /// Report devices that disappear from a poll.
    #[serde(default)]
    pub emit_removals: bool,
}

impl BridgeProfile {
    pub fn new(kind: ProfileKind) -> Self {
        Self {
            kind,
            url: None,
            username: None,
            password: None,
            password_env: None,
            host: None,
            token: None,
            token_env: None,
            access_key: None,
            poll_interval: None,
            retry_delay: None,
            timeout: None,
            presence_interval: None,
            ca_cert: None,
            insecure: None,
            emit_removals: false,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "hubsync", "hubsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hubsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from a specific file + environment.
///
/// Environment keys nest on a double underscore, e.g.
/// `HUBSYNC_DEFAULTS__POLL_INTERVAL=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    extract(
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("HUBSYNC_").split("__")),
    )
}

/// Extract a Config from any figment; useful for layering in tests.
pub fn extract(figment: Figment) -> Result<Config, ConfigError> {
    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Env var, then system keyring, then plaintext.
fn resolve_secret(
    env_name: Option<&str>,
    keyring_user: &str,
    plaintext: Option<&str>,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Option<SecretString> {
    if let Some(val) = env_name.and_then(|name| lookup_env(name)) {
        return Some(SecretString::from(val));
    }

    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, keyring_user) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    plaintext.map(|p| SecretString::from(p.to_owned()))
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolve a portal bridge's account name and password.
pub fn resolve_portal_credentials(
    profile: &BridgeProfile,
    bridge: &str,
) -> Result<(String, SecretString), ConfigError> {
    portal_credentials_with(profile, bridge, process_env)
}

fn portal_credentials_with(
    profile: &BridgeProfile,
    bridge: &str,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Result<(String, SecretString), ConfigError> {
    let no_credentials = || ConfigError::NoCredentials {
        bridge: bridge.into(),
    };

    let username = profile
        .username
        .clone()
        .or_else(|| lookup_env("HUBSYNC_USERNAME"))
        .ok_or_else(no_credentials)?;

    let password = resolve_secret(
        profile.password_env.as_deref(),
        &format!("{bridge}/password"),
        profile.password.as_deref(),
        lookup_env,
    )
    .ok_or_else(no_credentials)?;

    Ok((username, password))
}

/// Resolve a gateway token, if one has been issued.
pub fn resolve_gateway_token(profile: &BridgeProfile, bridge: &str) -> Option<SecretString> {
    gateway_token_with(profile, bridge, process_env)
}

fn gateway_token_with(
    profile: &BridgeProfile,
    bridge: &str,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Option<SecretString> {
    resolve_secret(
        profile.token_env.as_deref(),
        &format!("{bridge}/token"),
        profile.token.as_deref(),
        lookup_env,
    )
    .filter(|t| !t.expose_secret().is_empty())
}

/// Where to keep a newly issued gateway token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStore {
    Keyring,
    Plaintext,
}

/// Record a token issued by pairing. The caller saves the config afterwards.
pub fn save_gateway_token(
    cfg: &mut Config,
    bridge: &str,
    token: &SecretString,
    access_key: &str,
    store: TokenStore,
) -> Result<(), ConfigError> {
    let profile = cfg
        .bridges
        .get_mut(bridge)
        .ok_or_else(|| ConfigError::UnknownBridge {
            bridge: bridge.into(),
        })?;
    if profile.kind != ProfileKind::Gateway {
        return Err(ConfigError::Validation {
            field: "kind".into(),
            reason: format!("bridge '{bridge}' is not a gateway"),
        });
    }

    match store {
        TokenStore::Keyring => {
            keyring::Entry::new(KEYRING_SERVICE, &format!("{bridge}/token"))?
                .set_password(token.expose_secret())?;
            profile.token = None;
        }
        TokenStore::Plaintext => profile.token = Some(token.expose_secret().to_owned()),
    }
    profile.access_key = Some(access_key.to_owned());
    Ok(())
}

// ── Translation to runtime config ───────────────────────────────────

/// Build the runtime config for one named bridge.
pub fn bridge_config(cfg: &Config, bridge: &str) -> Result<BridgeConfig, ConfigError> {
    let profile = cfg
        .bridges
        .get(bridge)
        .ok_or_else(|| ConfigError::UnknownBridge {
            bridge: bridge.into(),
        })?;
    profile_to_bridge_config(profile, bridge, &cfg.defaults)
}

/// Build a `BridgeConfig` from a profile and the global defaults.
pub fn profile_to_bridge_config(
    profile: &BridgeProfile,
    bridge: &str,
    defaults: &Defaults,
) -> Result<BridgeConfig, ConfigError> {
    profile_to_bridge_config_with(profile, bridge, defaults, process_env)
}

fn profile_to_bridge_config_with(
    profile: &BridgeProfile,
    bridge: &str,
    defaults: &Defaults,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Result<BridgeConfig, ConfigError> {
    let mut config = match profile.kind {
        ProfileKind::Portal => {
            let raw = profile.url.as_deref().unwrap_or(DEFAULT_PORTAL_URL);
            let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
                field: "url".into(),
                reason: format!("invalid URL: {raw}"),
            })?;
            let (username, password) = portal_credentials_with(profile, bridge, &lookup_env)?;
            BridgeConfig::portal(bridge, url, username, password)
        }
        ProfileKind::Gateway => {
            let host = profile
                .host
                .clone()
                .filter(|h| !h.trim().is_empty())
                .ok_or_else(|| ConfigError::Validation {
                    field: "host".into(),
                    reason: "gateway bridges need a host".into(),
                })?;
            let token = gateway_token_with(profile, bridge, &lookup_env);
            let mut config = BridgeConfig::gateway(bridge, host, token);
            if let Some(retry) = profile.retry_delay {
                config.retry_delay = seconds("retry_delay", retry)?;
            }
            config
        }
    };

    if profile.insecure.unwrap_or(false) {
        config.tls = TlsVerification::DangerAcceptInvalid;
    } else if let Some(ref ca_path) = profile.ca_cert {
        config.tls = TlsVerification::CustomCa(ca_path.clone());
    }

    config.poll_interval = seconds(
        "poll_interval",
        profile.poll_interval.unwrap_or(defaults.poll_interval),
    )?;
    config.timeout = seconds("timeout", profile.timeout.unwrap_or(defaults.timeout))?;
    if profile.kind == ProfileKind::Portal {
        config.retry_delay = seconds(
            "retry_delay",
            profile.retry_delay.unwrap_or(defaults.retry_delay),
        )?;
    }
    if let Some(presence) = profile.presence_interval {
        config.presence_interval = (presence > 0).then_some(Duration::from_secs(presence));
    }
    config.emit_removals = profile.emit_removals;

    Ok(config)
}

fn seconds(field: &str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be at least 1 second".into(),
        });
    }
    Ok(Duration::from_secs(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hubsync_core::BridgeKind;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
        [defaults]
        poll_interval = 45

        [bridges.upstairs]
        kind = "portal"
        username = "me@example.com"
        password_env = "UPSTAIRS_PASSWORD"

        [bridges.lights]
        kind = "gateway"
        host = "192.168.1.40"
        poll_interval = 10
    "#;

    fn sample() -> Config {
        extract(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::string(SAMPLE)),
        )
        .unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parses_bridges_and_fills_defaults() {
        let cfg = sample();
        assert_eq!(cfg.defaults.poll_interval, 45);
        assert_eq!(cfg.defaults.timeout, 30);
        assert_eq!(cfg.bridges.len(), 2);
        assert_eq!(cfg.bridges["lights"].kind, ProfileKind::Gateway);
        assert_eq!(cfg.bridges["upstairs"].password_env.as_deref(), Some("UPSTAIRS_PASSWORD"));
    }

    #[test]
    fn portal_password_comes_from_named_env_var() {
        let cfg = sample();
        let env = |name: &str| (name == "UPSTAIRS_PASSWORD").then(|| "hunter2".to_owned());

        let config =
            profile_to_bridge_config_with(&cfg.bridges["upstairs"], "upstairs", &cfg.defaults, env)
                .unwrap();

        let BridgeKind::Portal { url, username, password } = &config.kind else {
            panic!("expected a portal bridge");
        };
        assert_eq!(url.as_str(), "https://mytotalconnectcomfort.com/");
        assert_eq!(username, "me@example.com");
        assert_eq!(password.expose_secret(), "hunter2");
        assert_eq!(config.poll_interval, Duration::from_secs(45));
        assert_eq!(config.retry_delay, Duration::from_secs(60));
        assert_eq!(config.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn portal_without_password_has_no_credentials() {
        let mut profile = BridgeProfile::new(ProfileKind::Portal);
        profile.username = Some("me@example.com".into());

        let err = profile_to_bridge_config_with(
            &profile,
            "hubsync-test-no-such-bridge",
            &Defaults::default(),
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn gateway_profile_uses_gateway_defaults() {
        let cfg = sample();
        let config =
            profile_to_bridge_config_with(&cfg.bridges["lights"], "lights", &cfg.defaults, no_env)
                .unwrap();

        assert!(matches!(config.kind, BridgeKind::Gateway { ref host, .. } if host == "192.168.1.40"));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.retry_delay, Duration::from_secs(15));
        assert_eq!(config.presence_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn gateway_without_host_is_invalid() {
        let profile = BridgeProfile::new(ProfileKind::Gateway);
        let err = profile_to_bridge_config_with(&profile, "lights", &Defaults::default(), no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "host"));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut profile = BridgeProfile::new(ProfileKind::Gateway);
        profile.host = Some("gw.local".into());
        profile.poll_interval = Some(0);
        let err = profile_to_bridge_config_with(&profile, "lights", &Defaults::default(), no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "poll_interval"));
    }

    #[test]
    fn saved_token_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = sample();

        save_gateway_token(
            &mut cfg,
            "lights",
            &SecretString::from("tok-123".to_string()),
            "seed-1",
            TokenStore::Plaintext,
        )
        .unwrap();
        save_config_to(&cfg, &path).unwrap();

        let reloaded = extract(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::file(&path)),
        )
        .unwrap();
        let lights = &reloaded.bridges["lights"];
        assert_eq!(lights.access_key.as_deref(), Some("seed-1"));
        assert_eq!(
            gateway_token_with(lights, "lights", no_env).unwrap().expose_secret(),
            "tok-123"
        );
        assert_eq!(reloaded.defaults.poll_interval, 45);
    }

    #[test]
    fn token_for_portal_or_unknown_bridge_is_refused() {
        let mut cfg = sample();
        let token = SecretString::from("tok".to_string());

        let err = save_gateway_token(&mut cfg, "upstairs", &token, "k", TokenStore::Plaintext)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));

        let err = save_gateway_token(&mut cfg, "attic", &token, "k", TokenStore::Plaintext)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBridge { .. }));
    }
}
