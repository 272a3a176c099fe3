//! `shopfront-core`: shared building blocks for the storefront client.
//!
//! Pure types only: error model, keyed identifiers, version expectations.
//! No IO, no async.

pub mod entity;
pub mod error;
pub mod id;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ProductKey, UniqueKey};
pub use version::ExpectedVersion;
