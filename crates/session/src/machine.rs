//! Sign-in state machine.
//!
//! ```text
//! Anonymous ──login──▶ CredentialsSubmitted ──┬──▶ Authenticated
//!     ▲                                       └──▶ MfaPending ──code──▶ Authenticated
//!     └──────────── logout / cancel / rejection ◀──────┘
//! ```
//!
//! Only one network-bound operation runs at a time; a second one is refused
//! with [`SessionError::Busy`] instead of queueing. Every attempt carries a
//! nonce, and a response that arrives after [`AuthSessionMachine::cancel`] or
//! [`AuthSessionMachine::logout`] is dropped without touching the store.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use shopfront_auth::{Credential, Identity, validate_claims};
use shopfront_core::ExpectedVersion;

use crate::api::{ApiError, AuthApi};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::store::SessionStore;

/// Length of a second-factor code.
const MFA_CODE_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    /// Email and password are on the wire.
    CredentialsSubmitted,
    /// Password accepted; a temporary credential waits for the second factor.
    MfaPending,
    Authenticated,
}

impl AuthState {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthState::Anonymous => "anonymous",
            AuthState::CredentialsSubmitted => "credentials_submitted",
            AuthState::MfaPending => "mfa_pending",
            AuthState::Authenticated => "authenticated",
        }
    }
}

impl core::fmt::Display for AuthState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Signed in. `redirect_to` is the pending destination, or the default
    /// landing page when nothing was pending.
    Authenticated { redirect_to: String },
    /// Password accepted; call [`AuthSessionMachine::submit_mfa_code`].
    MfaRequired,
}

#[derive(Debug)]
struct Inner {
    state: AuthState,
    /// Held in memory only, never handed to the store.
    temporary: Option<Credential>,
    mfa_failures: u32,
    attempt: u64,
}

impl Inner {
    fn begin_attempt(&mut self) -> u64 {
        self.attempt += 1;
        self.state = AuthState::CredentialsSubmitted;
        self.temporary = None;
        self.mfa_failures = 0;
        self.attempt
    }

    fn reset(&mut self) {
        self.state = AuthState::Anonymous;
        self.temporary = None;
        self.mfa_failures = 0;
    }
}

pub struct AuthSessionMachine {
    api: Arc<dyn AuthApi>,
    store: Arc<SessionStore>,
    default_landing: String,
    max_mfa_attempts: u32,
    inner: Mutex<Inner>,
    flight: Mutex<()>,
}

impl core::fmt::Debug for AuthSessionMachine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthSessionMachine")
            .field("default_landing", &self.default_landing)
            .field("max_mfa_attempts", &self.max_mfa_attempts)
            .finish_non_exhaustive()
    }
}

impl AuthSessionMachine {
    /// A new machine starts `Anonymous`, even over a restored store; call
    /// [`AuthSessionMachine::validate_session`] to resume a stored session.
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<SessionStore>, config: &ClientConfig) -> Self {
        Self {
            api,
            store,
            default_landing: config.default_landing.clone(),
            max_mfa_attempts: config.max_mfa_attempts.max(1),
            inner: Mutex::new(Inner {
                state: AuthState::Anonymous,
                temporary: None,
                mfa_failures: 0,
                attempt: 0,
            }),
            flight: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> AuthState {
        self.inner.lock().await.state
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Submit email and password.
    ///
    /// Allowed from `Anonymous`, and from `MfaPending` (which abandons the
    /// pending second factor).
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, SessionError> {
        validate_credentials(email, password)?;
        let _flight = self.flight.try_lock().map_err(|_| SessionError::Busy)?;

        let attempt = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                AuthState::Authenticated | AuthState::CredentialsSubmitted => {
                    return Err(SessionError::InvalidState {
                        expected: AuthState::Anonymous,
                        actual: inner.state,
                    });
                }
                AuthState::MfaPending => {
                    tracing::info!("sign-in restarted; pending second factor discarded");
                }
                AuthState::Anonymous => {}
            }
            inner.begin_attempt()
        };
        tracing::info!(attempt, "credentials submitted");

        let result = self.api.login(email.trim(), password).await;

        let mut inner = self.inner.lock().await;
        if inner.attempt != attempt {
            tracing::info!(attempt, "discarding result of abandoned sign-in");
            return Err(SessionError::Superseded);
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                inner.reset();
                return Err(login_failure(err));
            }
        };

        if response.mfa_required {
            inner.temporary = Some(Credential::temporary(response.token.access_token));
            inner.state = AuthState::MfaPending;
            tracing::info!(attempt, "second factor required");
            return Ok(LoginOutcome::MfaRequired);
        }

        let (credential, generation) =
            self.establish(&mut inner, response.token.access_token).await?;
        drop(inner);

        self.finish_sign_in(&credential, generation).await
    }

    /// Submit the six-digit second-factor code. Only valid in `MfaPending`.
    ///
    /// A rejected code keeps the machine in `MfaPending` until the attempt
    /// budget runs out; an expired temporary credential ends the attempt.
    pub async fn submit_mfa_code(&self, code: &str) -> Result<LoginOutcome, SessionError> {
        let _flight = self.flight.try_lock().map_err(|_| SessionError::Busy)?;

        let (temporary, attempt) = {
            let inner = self.inner.lock().await;
            let temporary = match (inner.state, &inner.temporary) {
                (AuthState::MfaPending, Some(temporary)) => temporary.clone(),
                _ => {
                    return Err(SessionError::InvalidState {
                        expected: AuthState::MfaPending,
                        actual: inner.state,
                    });
                }
            };
            validate_code(code)?;
            (temporary, inner.attempt)
        };

        let result = self.api.complete_mfa(&temporary, code.trim()).await;

        let mut inner = self.inner.lock().await;
        if inner.attempt != attempt {
            tracing::info!(attempt, "discarding result of abandoned second factor");
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(token) => {
                let (credential, generation) =
                    self.establish(&mut inner, token.access_token).await?;
                drop(inner);

                self.finish_sign_in(&credential, generation).await
            }
            Err(ApiError::Rejected { status: 401, reason }) => {
                tracing::warn!("temporary credential rejected: {reason}");
                inner.reset();
                Err(SessionError::SessionExpired(reason))
            }
            Err(ApiError::Rejected { reason, .. }) => {
                inner.mfa_failures += 1;
                if inner.mfa_failures >= self.max_mfa_attempts {
                    tracing::warn!(failures = inner.mfa_failures, "second factor attempts exhausted");
                    inner.reset();
                    return Err(SessionError::MfaAttemptsExhausted);
                }

                let attempts_remaining = self.max_mfa_attempts - inner.mfa_failures;
                tracing::warn!(attempts_remaining, "second factor code rejected");
                Err(SessionError::InvalidMfaCode {
                    reason,
                    attempts_remaining,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// End the session. Idempotent, and allowed in any state: an in-flight
    /// attempt is abandoned.
    pub async fn logout(&self) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock().await;
            inner.attempt += 1;
            inner.reset();
        }
        self.store.clear_credential().await?;
        tracing::info!("signed out");
        Ok(())
    }

    /// Abandon the current sign-in attempt. A response that is still on its
    /// way will be discarded. No effect once authenticated.
    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        inner.attempt += 1;
        if matches!(
            inner.state,
            AuthState::CredentialsSubmitted | AuthState::MfaPending
        ) {
            tracing::info!(state = %inner.state, "sign-in attempt abandoned");
            inner.reset();
        }
    }

    /// Check the stored credential against `GET /users/me`.
    ///
    /// - no credential: `Ok(None)`
    /// - accepted: identity cached and returned; machine is `Authenticated`
    /// - rejected, or locally expired: credential cleared, `SessionExpired`
    /// - network trouble: `TransientNetwork`, nothing changes
    ///
    /// A clear only happens if the credential is still the one that was
    /// checked, so a sign-in that completed meanwhile is never undone.
    pub async fn validate_session(&self) -> Result<Option<Identity>, SessionError> {
        let _flight = self.flight.try_lock().map_err(|_| SessionError::Busy)?;

        let (credential, generation) = self.store.credential_with_generation().await;
        let Some(credential) = credential else {
            self.demote().await;
            return Ok(None);
        };

        // Opaque tokens carry no claims and go straight to the server.
        if let Ok(claims) = credential.claims() {
            if let Err(err) = validate_claims(&claims, Utc::now()) {
                tracing::info!("stored credential expired locally");
                return if self.expire(generation).await {
                    Err(SessionError::SessionExpired(err.to_string()))
                } else {
                    Err(SessionError::Superseded)
                };
            }
        }

        match self.api.fetch_identity(&credential).await {
            Ok(identity) => {
                if !self
                    .store
                    .set_identity_if(ExpectedVersion::Exact(generation), identity.clone())
                    .await
                {
                    return Err(SessionError::Superseded);
                }

                let mut inner = self.inner.lock().await;
                if inner.state == AuthState::Anonymous {
                    inner.state = AuthState::Authenticated;
                    tracing::info!("stored session resumed");
                }
                Ok(Some(identity))
            }
            Err(ApiError::Rejected { reason, .. }) => {
                tracing::warn!("stored credential rejected: {reason}");
                if self.expire(generation).await {
                    Err(SessionError::SessionExpired(reason))
                } else {
                    Err(SessionError::Superseded)
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Persist the full credential and enter `Authenticated`. Called with the
    /// state lock held so a concurrent cancel cannot interleave.
    async fn establish(
        &self,
        inner: &mut Inner,
        token: String,
    ) -> Result<(Credential, u64), SessionError> {
        let credential = Credential::full(token);
        let generation = match self.store.set_credential(credential.clone()).await {
            Ok(generation) => generation,
            Err(err) => {
                inner.reset();
                return Err(err);
            }
        };

        inner.state = AuthState::Authenticated;
        inner.temporary = None;
        inner.mfa_failures = 0;
        Ok((credential, generation))
    }

    /// Confirm the new credential with an identity lookup, then hand out the
    /// pending destination. The destination survives a rejected lookup.
    async fn finish_sign_in(&self, credential: &Credential, generation: u64) -> Result<LoginOutcome, SessionError> {
        self.refresh_identity(credential, generation).await?;

        let redirect_to = self
            .store
            .consume_pending_destination()
            .await
            .unwrap_or_else(|| self.default_landing.clone());
        tracing::info!(%redirect_to, "signed in");

        Ok(LoginOutcome::Authenticated { redirect_to })
    }

    /// Load the identity behind a freshly issued credential.
    ///
    /// A rejection ends the session just as it does in
    /// [`AuthSessionMachine::validate_session`]; network trouble leaves the
    /// session in place without an identity.
    async fn refresh_identity(&self, credential: &Credential, generation: u64) -> Result<(), SessionError> {
        match self.api.fetch_identity(credential).await {
            Ok(identity) => {
                if !self
                    .store
                    .set_identity_if(ExpectedVersion::Exact(generation), identity)
                    .await
                {
                    tracing::debug!("credential replaced before identity arrived");
                }
                Ok(())
            }
            Err(ApiError::Rejected { reason, .. }) => {
                tracing::warn!("new credential rejected by identity lookup: {reason}");
                if self.expire(generation).await {
                    Err(SessionError::SessionExpired(reason))
                } else {
                    Err(SessionError::Superseded)
                }
            }
            Err(err) => {
                tracing::warn!("signed in, but identity could not be loaded: {err}");
                Ok(())
            }
        }
    }

    /// Clear the credential read at `generation`. Returns whether it was
    /// still the live one.
    async fn expire(&self, generation: u64) -> bool {
        let cleared = match self
            .store
            .clear_credential_if(ExpectedVersion::Exact(generation))
            .await
        {
            Ok(cleared) => cleared,
            // Memory was cleared; only the storage delete failed.
            Err(err) => {
                tracing::error!("expired credential could not be removed from storage: {err}");
                true
            }
        };
        if cleared {
            self.demote().await;
        }
        cleared
    }

    async fn demote(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == AuthState::Authenticated {
            inner.reset();
            tracing::info!("session ended");
        }
    }
}

fn login_failure(err: ApiError) -> SessionError {
    match err {
        ApiError::Rejected { status, reason } => {
            tracing::warn!(status, "credentials rejected: {reason}");
            SessionError::AuthenticationFailed(reason)
        }
        other => other.into(),
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), SessionError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(SessionError::validation("email is required"));
    }
    if password.is_empty() {
        return Err(SessionError::validation("password is required"));
    }
    if !email.contains('@') {
        return Err(SessionError::validation("email address is not valid"));
    }
    Ok(())
}

fn validate_code(code: &str) -> Result<(), SessionError> {
    let code = code.trim();
    if code.len() == MFA_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(SessionError::validation(format!(
            "code must be {MFA_CODE_LEN} digits"
        )))
    }
}
