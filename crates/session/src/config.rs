//! Client configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::{MemorySessionStorage, SessionStorage, SqliteSessionStorage, StorageError};

/// Where the session is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageLocation {
    /// `{app_data_dir}/shopfront/session.db`.
    #[default]
    DefaultDataDir,
    /// SQLite database at an explicit path.
    Path(PathBuf),
    /// Nothing persisted; the session ends with the process.
    Memory,
}

impl StorageLocation {
    pub fn open(&self) -> Result<Arc<dyn SessionStorage>, StorageError> {
        Ok(match self {
            StorageLocation::DefaultDataDir => Arc::new(SqliteSessionStorage::open_default()?),
            StorageLocation::Path(path) => Arc::new(SqliteSessionStorage::open(path.clone())),
            StorageLocation::Memory => Arc::new(MemorySessionStorage::new()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend API, including the version prefix.
    pub api_base_url: String,
    /// Authentication entry point that denied callers are sent to.
    pub login_path: String,
    /// Where a successful sign-in lands when nothing was pending.
    pub default_landing: String,
    pub request_timeout: Duration,
    /// Consecutive invalid second-factor codes tolerated before the
    /// temporary credential is discarded.
    pub max_mfa_attempts: u32,
    pub storage: StorageLocation,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            login_path: "/login".to_string(),
            default_landing: "/cabinet".to_string(),
            request_timeout: Duration::from_secs(10),
            max_mfa_attempts: 5,
            storage: StorageLocation::DefaultDataDir,
        }
    }
}

impl ClientConfig {
    /// Build from `SHOPFRONT_*` environment variables, falling back to
    /// defaults (with a warning) for anything missing or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let api_base_url = lookup("SHOPFRONT_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                tracing::info!("SHOPFRONT_API_URL not set; using {}", defaults.api_base_url);
                defaults.api_base_url.clone()
            });

        let request_timeout = parsed(&lookup, "SHOPFRONT_REQUEST_TIMEOUT_SECS")
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let max_mfa_attempts = parsed(&lookup, "SHOPFRONT_MAX_MFA_ATTEMPTS")
            .filter(|n: &u32| *n > 0)
            .unwrap_or(defaults.max_mfa_attempts);

        let storage = match lookup("SHOPFRONT_SESSION_DB").as_deref() {
            None | Some("") => StorageLocation::DefaultDataDir,
            Some(":memory:") => StorageLocation::Memory,
            Some(path) => StorageLocation::Path(PathBuf::from(path)),
        };

        Self {
            api_base_url,
            request_timeout,
            max_mfa_attempts,
            storage,
            ..defaults
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("{key}={raw:?} is not valid; using default");
            None
        }
    }
}
