//! Configuration error model.

use thiserror::Error;

/// Result type used while loading configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration-level error.
///
/// Raised once at startup; a process with an invalid security configuration
/// must not start serving.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was present but could not be parsed.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    /// Individually valid settings that contradict each other.
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

impl ConfigError {
    pub fn invalid(key: &'static str, msg: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            message: msg.into(),
        }
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::Inconsistent(msg.into())
    }
}
