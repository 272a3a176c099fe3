//! Tracing/logging initialization.

use core::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Environment variable selecting the [`LogFormat`].
pub const LOG_FORMAT_ENV: &str = "SHOPFRONT_LOG_FORMAT";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable, for terminals.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{other}' (expected json or pretty)")),
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Filtering is controlled by `RUST_LOG` (default `info`). Safe to call
/// multiple times (subsequent calls are no-ops).
pub fn init_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let _ = match format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.with_target(true).try_init(),
    };
}

/// Format named by a raw `SHOPFRONT_LOG_FORMAT` value. Unset or blank means
/// the default.
pub fn resolve_format(raw: Option<&str>) -> Result<LogFormat, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(LogFormat::default()),
        Some(name) => name.parse(),
    }
}

/// Initialize logging in the format named by `SHOPFRONT_LOG_FORMAT`.
///
/// An unrecognized value falls back to JSON and is reported once the
/// subscriber is up.
pub fn init_from_env() {
    let raw = std::env::var(LOG_FORMAT_ENV).ok();
    match resolve_format(raw.as_deref()) {
        Ok(format) => init_with(format),
        Err(err) => {
            init_with(LogFormat::default());
            ::tracing::warn!("ignoring {LOG_FORMAT_ENV}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_names() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn unset_or_blank_format_is_json() {
        assert_eq!(resolve_format(None), Ok(LogFormat::Json));
        assert_eq!(resolve_format(Some("  ")), Ok(LogFormat::Json));
        assert_eq!(resolve_format(Some(" Pretty ")), Ok(LogFormat::Pretty));
        assert!(resolve_format(Some("yaml")).is_err());
    }

    #[test]
    fn init_is_idempotent() {
        init_with(LogFormat::Pretty);
        init_with(LogFormat::Json);
    }
}
