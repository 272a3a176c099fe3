use serde::{Deserialize, Serialize};

use crate::claims::{TokenClaims, TokenValidationError, decode_unverified};

/// Bearer credential plus its class.
///
/// A temporary credential is what the backend hands out after a correct
/// password when a second factor is still required. It authorizes MFA
/// completion and nothing else.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    token: String,
    temporary: bool,
}

impl Credential {
    /// A full-session credential.
    pub fn full(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            temporary: false,
        }
    }

    /// An MFA-only credential.
    pub fn temporary(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            temporary: true,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn is_empty(&self) -> bool {
        self.token.trim().is_empty()
    }

    /// Claims carried by the token, if it is a JWT. Signature is not checked.
    pub fn claims(&self) -> Result<TokenClaims, TokenValidationError> {
        decode_unverified(&self.token)
    }
}

// Tokens never reach log output.
impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("temporary", &self.temporary)
            .finish()
    }
}
