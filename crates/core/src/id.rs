//! Strongly-typed string keys.
//!
//! The backend identifies users by a short opaque `ukey` and catalog entries by
//! their title. Both are plain strings on the wire; wrapping them keeps a
//! product title from being passed where a user key is expected.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Opaque per-user key assigned by the backend (`ukey` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueKey(String);

/// Catalog key of a product. The storefront keys products by title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductKey(String);

macro_rules! impl_string_key {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw value without validation.
            ///
            /// Use `parse` when the value comes from user input.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.trim().is_empty() {
                    return Err(DomainError::invalid_id(concat!($name, ": must not be empty")));
                }
                Ok(Self(s.to_string()))
            }
        }
    };
}

impl_string_key!(UniqueKey, "UniqueKey");
impl_string_key!(ProductKey, "ProductKey");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_blank_keys() {
        assert!("".parse::<ProductKey>().is_err());
        assert!("   ".parse::<UniqueKey>().is_err());

        let err = "".parse::<ProductKey>().unwrap_err();
        assert!(err.to_string().contains("ProductKey"));
    }

    #[test]
    fn keys_serialize_as_plain_strings() {
        let key = ProductKey::new("Half-Life 2");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"Half-Life 2\"");

        let back: UniqueKey = serde_json::from_str("\"AB12CD34EF56\"").unwrap();
        assert_eq!(back.as_str(), "AB12CD34EF56");
    }
}
