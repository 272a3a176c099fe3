//! Unverified view of JWT claims.
//!
//! The client cannot check signatures (the key lives on the server), but the
//! payload still tells it when a stored token has expired, which lets a
//! restored session be dropped before any request is made. Tokens that are
//! not JWTs are treated as opaque and skip this check.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims the backend puts into access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub ukey: String,
    pub email: String,
    pub role: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token is not a decodable JWT: {0}")]
    Malformed(String),

    #[error("token has expired")]
    Expired,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// Decode the payload segment of a JWT without verifying its signature.
pub fn decode_unverified(token: &str) -> Result<TokenClaims, TokenValidationError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(TokenValidationError::Malformed(
                "expected three dot-separated segments".to_string(),
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| TokenValidationError::Malformed(e.to_string()))
}

/// Check the claims' time window against `now`.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    match claims.expires_at() {
        Some(expires_at) if now < expires_at => Ok(()),
        _ => Err(TokenValidationError::Expired),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn jwt_with(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn decodes_backend_claims() {
        let exp = Utc::now().timestamp() + 3600;
        let token = jwt_with(&serde_json::json!({
            "ukey": "user-123",
            "email": "user@example.com",
            "role": "user",
            "exp": exp,
        }));

        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.ukey, "user-123");
        assert_eq!(claims.role, "user");
        assert!(validate_claims(&claims, Utc::now()).is_ok());
    }

    #[test]
    fn expired_claims_are_rejected() {
        let claims = TokenClaims {
            ukey: "k".to_string(),
            email: "e@example.com".to_string(),
            role: "user".to_string(),
            exp: (Utc::now() - Duration::minutes(1)).timestamp(),
        };
        assert_eq!(
            validate_claims(&claims, Utc::now()),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn opaque_tokens_are_malformed() {
        assert!(matches!(
            decode_unverified("not-a-jwt"),
            Err(TokenValidationError::Malformed(_))
        ));
        assert!(matches!(
            decode_unverified("a.!!!.c"),
            Err(TokenValidationError::Malformed(_))
        ));
    }
}
