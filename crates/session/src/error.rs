//! Session error model.
//!
//! Every failure the sign-in flow can produce lands in one of these variants;
//! no transport error escapes as a panic or an untyped error. Access denial is
//! absent: the gate answers with [`crate::AccessDecision::Deny`]
//! and a redirect instead.

use thiserror::Error;

use crate::api::ApiError;
use crate::machine::AuthState;
use crate::storage::StorageError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Bad input, rejected before any request was sent.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The server rejected the email/password pair. The message is the
    /// server's own wording.
    #[error("{0}")]
    AuthenticationFailed(String),

    /// The server rejected a second-factor code. The session stays in MFA.
    #[error("{reason}")]
    InvalidMfaCode { reason: String, attempts_remaining: u32 },

    /// Too many invalid codes; the temporary credential was discarded.
    #[error("too many invalid codes; sign in again")]
    MfaAttemptsExhausted,

    /// The stored credential was rejected or has expired. Session state has
    /// already been cleared when this is returned.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// Network or server trouble. Nothing changed; retrying is safe.
    #[error("network problem, please try again ({0})")]
    TransientNetwork(String),

    /// Another sign-in request is still in flight.
    #[error("another sign-in request is already in progress")]
    Busy,

    /// The attempt was cancelled (or logged out) before its result arrived;
    /// the result was discarded.
    #[error("sign-in attempt was abandoned")]
    Superseded,

    /// Operation called in a state that does not allow it.
    #[error("operation requires state {expected}, but session is {actual}")]
    InvalidState { expected: AuthState, actual: AuthState },

    #[error("session storage error: {0}")]
    Storage(String),
}

/// Coarse classification used by callers to pick a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    AuthenticationFailure,
    SessionExpired,
    TransientNetwork,
    /// Caller misuse or local storage trouble.
    Internal,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Validation(_) => ErrorKind::Validation,
            SessionError::AuthenticationFailed(_)
            | SessionError::InvalidMfaCode { .. }
            | SessionError::MfaAttemptsExhausted => ErrorKind::AuthenticationFailure,
            SessionError::SessionExpired(_) => ErrorKind::SessionExpired,
            SessionError::TransientNetwork(_) | SessionError::Busy => ErrorKind::TransientNetwork,
            SessionError::Superseded
            | SessionError::InvalidState { .. }
            | SessionError::Storage(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AuthenticationFailure | ErrorKind::TransientNetwork | ErrorKind::Validation
        ) && !matches!(self, SessionError::MfaAttemptsExhausted)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        SessionError::Storage(err.to_string())
    }
}

/// Transport errors that carry no flow-specific meaning. Rejections are
/// interpreted by the state machine, which knows which step was rejected.
impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected { reason, .. } => SessionError::AuthenticationFailed(reason),
            ApiError::Network(msg) | ApiError::Decode(msg) => SessionError::TransientNetwork(msg),
        }
    }
}
