//! Durable key/value storage behind the session store.
//!
//! The session persists exactly two well-known keys per device: the bearer
//! token and the last denied path. Nothing is synchronized across devices.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tokio::sync::Mutex;

/// Key of the persisted full-session bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Key of the persisted pending destination.
pub const PENDING_DESTINATION_KEY: &str = "last_visited_page";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("session storage unavailable: {0}")]
    Unavailable(String),
    #[error("session storage query failed: {0}")]
    Query(String),
}

/// Per-device key/value persistence.
#[async_trait]
pub trait SessionStorage: Send + Sync + core::fmt::Debug {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory
// ─────────────────────────────────────────────────────────────────────────────

/// Process-local storage. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed session storage (survives restarts on the same device).
#[derive(Debug, Clone)]
pub struct SqliteSessionStorage {
    path: PathBuf,
    /// Opened lazily on first use.
    pool: Arc<Mutex<Option<SqlitePool>>>,
}

impl SqliteSessionStorage {
    /// Storage at an explicit database file path.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: Arc::new(Mutex::new(None)),
        }
    }

    /// Storage at `{app_data_dir}/shopfront/session.db`.
    pub fn open_default() -> Result<Self, StorageError> {
        let path = session_db_path().map_err(|e| StorageError::Unavailable(format!("{e:#}")))?;
        Ok(Self::open(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn get_pool(&self) -> Result<SqlitePool, StorageError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let pool = connect(&self.path)
            .await
            .map_err(|e| StorageError::Unavailable(format!("{e:#}")))?;
        *guard = Some(pool.clone());
        Ok(pool)
    }
}

async fn connect(path: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create session directory at {parent:?}"))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    // One connection: every write is serialized by SQLite anyway, and a single
    // connection keeps read-after-write ordering trivial.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open session database at {path:?}"))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_kv (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await
    .context("failed to create session_kv table")?;

    Ok(pool)
}

#[async_trait]
impl SessionStorage for SqliteSessionStorage {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let pool = self.get_pool().await?;

        let row = sqlx::query(
            r#"
            SELECT value
            FROM session_kv
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let pool = self.get_pool().await?;

        sqlx::query(
            r#"
            INSERT INTO session_kv (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key)
            DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let pool = self.get_pool().await?;

        sqlx::query(
            r#"
            DELETE FROM session_kv
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .execute(&pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }
}

/// Resolve the path to the session database:
/// `{app_data_dir}/shopfront/session.db`.
fn session_db_path() -> anyhow::Result<PathBuf> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    dir.push("shopfront");
    dir.push("session.db");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_round_trip() {
        let storage = MemorySessionStorage::new();
        assert_eq!(storage.load(AUTH_TOKEN_KEY).await.unwrap(), None);

        storage.save(AUTH_TOKEN_KEY, "tok").await.unwrap();
        let shared = storage.clone();
        assert_eq!(shared.load(AUTH_TOKEN_KEY).await.unwrap().as_deref(), Some("tok"));

        storage.delete(AUTH_TOKEN_KEY).await.unwrap();
        assert_eq!(shared.load(AUTH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sqlite_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.db");

        let first = SqliteSessionStorage::open(&path);
        first.save(AUTH_TOKEN_KEY, "tok-1").await.unwrap();
        first.save(AUTH_TOKEN_KEY, "tok-2").await.unwrap();
        first.save(PENDING_DESTINATION_KEY, "/admin").await.unwrap();
        drop(first);

        let second = SqliteSessionStorage::open(&path);
        assert_eq!(second.load(AUTH_TOKEN_KEY).await.unwrap().as_deref(), Some("tok-2"));
        assert_eq!(
            second.load(PENDING_DESTINATION_KEY).await.unwrap().as_deref(),
            Some("/admin")
        );

        second.delete(PENDING_DESTINATION_KEY).await.unwrap();
        second.delete(PENDING_DESTINATION_KEY).await.unwrap();
        assert_eq!(second.load(PENDING_DESTINATION_KEY).await.unwrap(), None);
    }
}
