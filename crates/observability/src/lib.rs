//! Tracing/logging setup shared by Keystone binaries.

/// Initialize process-wide logging, format taken from `KEYSTONE_LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Tracing configuration (filters, formats).
pub mod tracing;

pub use self::tracing::LogFormat;
