//! `keystone-core` — shared building blocks for internal authentication.
//!
//! This crate holds the pieces every other crate leans on: identifiers, the
//! clock abstraction and deployment configuration. No IO beyond reading
//! environment values handed in by the caller.

pub mod clock;
pub mod config;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DEFAULT_RETAINED_SECRETS, DEFAULT_ROTATION_INTERVAL_MS, DEFAULT_SYSTEM_IDENTITY,
    DEFAULT_TOKEN_LIFETIME_MS, DeploymentMode, RotationPolicy, SecurityConfig, ServerConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use id::{RequestId, SecretId};
