//! `shopfront-session`
//!
//! **Responsibility:** client-side session for the storefront.
//!
//! This crate provides:
//! - A per-device session store (bearer credential, cached identity,
//!   pending destination) persisted in SQLite
//! - The sign-in state machine, including the second-factor branch
//! - The access gate that guards role-restricted destinations
//!
//! The backend stays the authority; this crate only holds what the backend
//! issued and decides locally whether a view may be shown.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod gate;
pub mod machine;
pub mod storage;
pub mod store;

pub use api::{AuthApi, ApiError, HttpAuthApi, LoginResponse, TokenResponse};
pub use app::AppState;
pub use config::{ClientConfig, StorageLocation};
pub use error::{ErrorKind, SessionError};
pub use gate::{AccessDecision, AccessGate};
pub use machine::{AuthSessionMachine, AuthState, LoginOutcome};
pub use storage::{MemorySessionStorage, SessionStorage, SqliteSessionStorage, StorageError};
pub use store::SessionStore;
