//! Deployment configuration for internal authentication.
//!
//! Values come from `KEYSTONE_*` environment variables. Loading goes through a
//! lookup function so callers (and tests) decide where values come from.

use std::net::SocketAddr;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::{ConfigError, ConfigResult};

/// Username carried by every internally minted token.
pub const DEFAULT_SYSTEM_IDENTITY: &str = "system";

/// Lifetime of a minted system token (5 minutes).
pub const DEFAULT_TOKEN_LIFETIME_MS: i64 = 5 * 60 * 1000;

/// Interval between secret rotations (15 minutes).
pub const DEFAULT_ROTATION_INTERVAL_MS: i64 = 15 * 60 * 1000;

/// Number of demoted secrets kept for validation after a rotation.
pub const DEFAULT_RETAINED_SECRETS: usize = 2;

pub const ENV_DEPLOYMENT_MODE: &str = "KEYSTONE_DEPLOYMENT_MODE";
pub const ENV_ENFORCE_INTERNAL_AUTH: &str = "KEYSTONE_ENFORCE_INTERNAL_AUTH";
pub const ENV_SYSTEM_IDENTITY: &str = "KEYSTONE_SYSTEM_IDENTITY";
pub const ENV_TOKEN_LIFETIME_MS: &str = "KEYSTONE_TOKEN_LIFETIME_MS";
pub const ENV_SECRET_ROTATION_MS: &str = "KEYSTONE_SECRET_ROTATION_MS";
pub const ENV_RETAINED_SECRETS: &str = "KEYSTONE_RETAINED_SECRETS";
pub const ENV_SHARED_SECRET: &str = "KEYSTONE_SHARED_SECRET";
pub const ENV_BIND_ADDR: &str = "KEYSTONE_BIND_ADDR";

/// Which authentication context variant this process runs with.
///
/// Resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    /// Control-plane service: request identity, then system identity, then
    /// the process account.
    #[default]
    Master,
    /// Workload container: system identity when enforcement is on, the
    /// process account otherwise.
    ProgramContainer,
    /// Standalone/test runs without authentication.
    NoOp,
}

impl core::str::FromStr for DeploymentMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "program-container" | "program_container" => Ok(Self::ProgramContainer),
            "noop" | "no-op" => Ok(Self::NoOp),
            other => Err(ConfigError::invalid(
                ENV_DEPLOYMENT_MODE,
                format!("unknown mode '{other}' (expected master, program-container or noop)"),
            )),
        }
    }
}

impl core::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::ProgramContainer => f.write_str("program-container"),
            Self::NoOp => f.write_str("noop"),
        }
    }
}

/// How often the signing secret changes and how long old secrets linger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// `None` disables periodic rotation.
    pub interval_ms: Option<i64>,
    pub retained_previous: usize,
}

impl RotationPolicy {
    pub fn disabled() -> Self {
        Self {
            interval_ms: None,
            retained_previous: DEFAULT_RETAINED_SECRETS,
        }
    }

    /// How long a demoted secret keeps validating tokens.
    ///
    /// Any token must expire inside this window, otherwise it could outlive
    /// the secret that signed it.
    pub fn grace_window_ms(&self) -> Option<i64> {
        self.interval_ms
            .map(|interval| interval.saturating_mul(self.retained_previous as i64))
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            interval_ms: Some(DEFAULT_ROTATION_INTERVAL_MS),
            retained_previous: DEFAULT_RETAINED_SECRETS,
        }
    }
}

/// Security settings shared by every component of one process.
///
/// Rotation and cross-service validation are mutually exclusive. A generated
/// secret rotates, but it never leaves this process, so only tokens minted
/// here validate. A shared secret lets peers validate each other's tokens,
/// and it is never rotated because peers have no way to learn a new key.
#[derive(Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    pub deployment_mode: DeploymentMode,
    pub enforce_internal_auth: bool,
    pub system_identity: String,
    pub token_lifetime_ms: i64,
    /// Ignored (forced to disabled) when `shared_secret` is set.
    pub rotation: RotationPolicy,
    /// Key material shared with peer services. `None` means generate one
    /// that is private to this process.
    pub shared_secret: Option<Vec<u8>>,
}

impl core::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("deployment_mode", &self.deployment_mode)
            .field("enforce_internal_auth", &self.enforce_internal_auth)
            .field("system_identity", &self.system_identity)
            .field("token_lifetime_ms", &self.token_lifetime_ms)
            .field("rotation", &self.rotation)
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            deployment_mode: DeploymentMode::default(),
            enforce_internal_auth: false,
            system_identity: DEFAULT_SYSTEM_IDENTITY.to_string(),
            token_lifetime_ms: DEFAULT_TOKEN_LIFETIME_MS,
            rotation: RotationPolicy::default(),
            shared_secret: None,
        }
    }
}

impl SecurityConfig {
    /// Load from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key/value source. Missing keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_DEPLOYMENT_MODE) {
            config.deployment_mode = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_ENFORCE_INTERNAL_AUTH) {
            config.enforce_internal_auth = parse_bool(ENV_ENFORCE_INTERNAL_AUTH, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SYSTEM_IDENTITY) {
            config.system_identity = raw.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TOKEN_LIFETIME_MS) {
            config.token_lifetime_ms = parse_millis(ENV_TOKEN_LIFETIME_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SECRET_ROTATION_MS) {
            let interval = parse_millis(ENV_SECRET_ROTATION_MS, &raw)?;
            config.rotation.interval_ms = (interval > 0).then_some(interval);
        }
        if let Some(raw) = lookup(ENV_RETAINED_SECRETS) {
            config.rotation.retained_previous = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_RETAINED_SECRETS, format!("{e}")))?;
        }
        if let Some(raw) = lookup(ENV_SHARED_SECRET) {
            let bytes = STANDARD
                .decode(raw.trim())
                .map_err(|e| ConfigError::invalid(ENV_SHARED_SECRET, format!("not base64: {e}")))?;
            config.shared_secret = Some(bytes);

            // Peers hold the same key; rotating it locally would split them.
            if config.rotation.interval_ms.is_some() {
                if lookup(ENV_SECRET_ROTATION_MS).is_some() {
                    tracing::warn!("{ENV_SECRET_ROTATION_MS} ignored because {ENV_SHARED_SECRET} is set");
                }
                config.rotation.interval_ms = None;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.system_identity.is_empty() {
            return Err(ConfigError::invalid(ENV_SYSTEM_IDENTITY, "must not be empty"));
        }
        if self.token_lifetime_ms <= 0 {
            return Err(ConfigError::invalid(ENV_TOKEN_LIFETIME_MS, "must be positive"));
        }
        if matches!(&self.shared_secret, Some(secret) if secret.is_empty()) {
            return Err(ConfigError::invalid(ENV_SHARED_SECRET, "must not be empty"));
        }
        if let Some(grace) = self.rotation.grace_window_ms() {
            if self.rotation.retained_previous == 0 {
                return Err(ConfigError::inconsistent(
                    "rotation requires at least one retained previous secret",
                ));
            }
            if self.token_lifetime_ms > grace {
                return Err(ConfigError::inconsistent(format!(
                    "token lifetime {}ms exceeds the secret grace window {grace}ms",
                    self.token_lifetime_ms
                )));
            }
        }
        Ok(())
    }
}

/// Settings for the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_BIND_ADDR) {
            config.bind_addr = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_BIND_ADDR, format!("{e}")))?;
        }
        Ok(config)
    }
}

fn parse_bool(key: &'static str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("expected a boolean, got '{other}'"))),
    }
}

fn parse_millis(key: &'static str, raw: &str) -> ConfigResult<i64> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, format!("{e}")))?;
    if value < 0 {
        return Err(ConfigError::invalid(key, "must not be negative"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> ConfigResult<SecurityConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SecurityConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config, SecurityConfig::default());
        assert_eq!(config.system_identity, "system");
        assert_eq!(config.rotation.grace_window_ms(), Some(30 * 60 * 1000));
    }

    #[test]
    fn parses_every_variable() {
        let config = load(&[
            (ENV_DEPLOYMENT_MODE, "program-container"),
            (ENV_ENFORCE_INTERNAL_AUTH, "TRUE"),
            (ENV_SYSTEM_IDENTITY, "platform"),
            (ENV_TOKEN_LIFETIME_MS, "60000"),
            (ENV_SECRET_ROTATION_MS, "120000"),
            (ENV_RETAINED_SECRETS, "1"),
        ])
        .unwrap();

        assert_eq!(config.deployment_mode, DeploymentMode::ProgramContainer);
        assert!(config.enforce_internal_auth);
        assert_eq!(config.system_identity, "platform");
        assert_eq!(config.token_lifetime_ms, 60_000);
        assert_eq!(config.rotation.interval_ms, Some(120_000));
        assert_eq!(config.rotation.retained_previous, 1);
    }

    #[test]
    fn zero_interval_disables_rotation() {
        let config = load(&[(ENV_SECRET_ROTATION_MS, "0")]).unwrap();
        assert_eq!(config.rotation.interval_ms, None);
        assert_eq!(config.rotation.grace_window_ms(), None);
    }

    #[test]
    fn shared_secret_disables_rotation() {
        let config = load(&[(ENV_SHARED_SECRET, "azE=")]).unwrap();
        assert_eq!(config.shared_secret.as_deref(), Some(&b"k1"[..]));
        assert_eq!(config.rotation.interval_ms, None);
    }

    #[test]
    fn lifetime_longer_than_grace_window_is_rejected() {
        let err = load(&[
            (ENV_TOKEN_LIFETIME_MS, "600000"),
            (ENV_SECRET_ROTATION_MS, "120000"),
            (ENV_RETAINED_SECRETS, "2"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = load(&[(ENV_ENFORCE_INTERNAL_AUTH, "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_ENFORCE_INTERNAL_AUTH, .. }));

        let err = load(&[(ENV_DEPLOYMENT_MODE, "edge")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_DEPLOYMENT_MODE, .. }));

        let err = load(&[(ENV_SHARED_SECRET, "***")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_SHARED_SECRET, .. }));
    }

    #[test]
    fn debug_output_redacts_the_secret() {
        let config = load(&[(ENV_SHARED_SECRET, "azE=")]).unwrap();
        let rendered = format!("{config:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("k1"));
    }

    #[test]
    fn bind_address_defaults_and_parses() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8080");

        let config =
            ServerConfig::from_lookup(|key| (key == ENV_BIND_ADDR).then(|| " 127.0.0.1:9000 ".to_string()))
                .unwrap();
        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 9000)));

        let err = ServerConfig::from_lookup(|_| Some("localhost".to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_BIND_ADDR, .. }));
    }
}
