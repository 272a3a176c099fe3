//! Logging setup shared by the storefront binaries.

/// Initialize process-wide logging in the format named by
/// `SHOPFRONT_LOG_FORMAT` (JSON when unset).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    self::tracing::init_from_env();
}

/// Tracing subscriber configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LOG_FORMAT_ENV, LogFormat, init_from_env, init_with, resolve_format};
