//! Session store: the single owner of the credential, the cached identity
//! and the pending destination.
//!
//! All three live behind one async mutex together with the storage write, so
//! a reader never sees a credential that is not yet persisted nor an identity
//! that belongs to a credential already cleared.

use std::sync::Arc;

use tokio::sync::Mutex;

use shopfront_auth::{Credential, Identity, Role, is_exact_role};
use shopfront_core::ExpectedVersion;

use crate::error::SessionError;
use crate::storage::{AUTH_TOKEN_KEY, MemorySessionStorage, PENDING_DESTINATION_KEY, SessionStorage};

#[derive(Debug, Default)]
struct SessionState {
    credential: Option<Credential>,
    identity: Option<Identity>,
    pending_destination: Option<String>,
    /// Bumped on every credential write or clear.
    generation: u64,
}

#[derive(Debug)]
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    state: Mutex<SessionState>,
}

impl SessionStore {
    /// Empty store over `storage`. Nothing is loaded; see [`SessionStore::restore`].
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Store that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStorage::new()))
    }

    /// Store primed with whatever `storage` kept from a previous run.
    ///
    /// The identity is never persisted; callers re-fetch it with the restored
    /// credential.
    pub async fn restore(storage: Arc<dyn SessionStorage>) -> Result<Self, SessionError> {
        let token = storage.load(AUTH_TOKEN_KEY).await?;
        let pending_destination = storage.load(PENDING_DESTINATION_KEY).await?;

        let credential = token
            .filter(|token| !token.trim().is_empty())
            .map(Credential::full);

        tracing::info!(
            has_credential = credential.is_some(),
            has_pending_destination = pending_destination.is_some(),
            "session restored"
        );

        Ok(Self {
            storage,
            state: Mutex::new(SessionState {
                credential,
                identity: None,
                pending_destination,
                generation: 0,
            }),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credential
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn credential(&self) -> Option<Credential> {
        self.state.lock().await.credential.clone()
    }

    /// Credential together with the generation it was read at, for a later
    /// [`SessionStore::clear_credential_if`].
    pub async fn credential_with_generation(&self) -> (Option<Credential>, u64) {
        let state = self.state.lock().await;
        (state.credential.clone(), state.generation)
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// Persist `credential` and make it the live one. Returns the new
    /// generation.
    ///
    /// Only full credentials are accepted. The cached identity belonged to
    /// the previous credential and is dropped.
    pub async fn set_credential(&self, credential: Credential) -> Result<u64, SessionError> {
        if credential.is_temporary() {
            return Err(SessionError::validation(
                "temporary credentials are never persisted",
            ));
        }
        if credential.is_empty() {
            return Err(SessionError::validation("credential token is empty"));
        }
        if let Ok(claims) = credential.claims() {
            if is_exact_role(&claims.role, Role::PartiallyLoggedIn) {
                return Err(SessionError::validation(
                    "token only grants the second-factor step",
                ));
            }
        }

        let mut state = self.state.lock().await;
        self.storage
            .save(AUTH_TOKEN_KEY, credential.token())
            .await
            .inspect_err(|e| tracing::error!("failed to persist credential: {e}"))?;

        state.credential = Some(credential);
        state.identity = None;
        state.generation += 1;
        tracing::info!(generation = state.generation, "credential stored");
        Ok(state.generation)
    }

    /// Drop the credential and the cached identity.
    ///
    /// Memory is cleared even when the storage delete fails; the error is
    /// still returned.
    pub async fn clear_credential(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        self.clear_locked(&mut state).await
    }

    /// Clear only if no credential write or clear happened since `expected`
    /// was observed. Returns whether anything was cleared.
    pub async fn clear_credential_if(&self, expected: ExpectedVersion) -> Result<bool, SessionError> {
        let mut state = self.state.lock().await;
        if !expected.matches(state.generation) {
            tracing::debug!(
                ?expected,
                actual = state.generation,
                "credential changed since it was read; not clearing"
            );
            return Ok(false);
        }
        self.clear_locked(&mut state).await?;
        Ok(true)
    }

    async fn clear_locked(&self, state: &mut SessionState) -> Result<(), SessionError> {
        let had_credential = state.credential.take().is_some();
        state.identity = None;
        state.generation += 1;
        if had_credential {
            tracing::info!(generation = state.generation, "credential cleared");
        }

        self.storage.delete(AUTH_TOKEN_KEY).await.map_err(|e| {
            tracing::error!("failed to delete persisted credential: {e}");
            SessionError::from(e)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identity
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn identity(&self) -> Option<Identity> {
        self.state.lock().await.identity.clone()
    }

    pub async fn set_identity(&self, identity: Identity) {
        self.state.lock().await.identity = Some(identity);
    }

    /// Cache `identity` only if the credential it was fetched with is still
    /// the live one.
    pub async fn set_identity_if(&self, expected: ExpectedVersion, identity: Identity) -> bool {
        let mut state = self.state.lock().await;
        if !expected.matches(state.generation) || state.credential.is_none() {
            return false;
        }
        state.identity = Some(identity);
        true
    }

    /// The identity, but only while a full credential backs it.
    pub async fn authenticated_identity(&self) -> Option<Identity> {
        let state = self.state.lock().await;
        match &state.credential {
            Some(credential) if !credential.is_temporary() => state.identity.clone(),
            _ => None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pending destination
    // ─────────────────────────────────────────────────────────────────────────

    /// Remember `path` as where to go after sign-in. Overwrites any earlier one.
    ///
    /// Memory is only updated once storage has accepted the write.
    pub async fn record_pending_destination(&self, path: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        self.storage
            .save(PENDING_DESTINATION_KEY, path)
            .await
            .inspect_err(|e| tracing::error!("failed to persist pending destination: {e}"))?;
        state.pending_destination = Some(path.to_string());
        Ok(())
    }

    pub async fn pending_destination(&self) -> Option<String> {
        self.state.lock().await.pending_destination.clone()
    }

    /// Read and clear the pending destination in one step.
    ///
    /// A failed storage delete is retried once. If it still fails the
    /// destination is gone from memory but may come back on the next
    /// [`SessionStore::restore`].
    pub async fn consume_pending_destination(&self) -> Option<String> {
        let mut state = self.state.lock().await;
        let destination = state.pending_destination.take()?;
        if let Err(e) = self.storage.delete(PENDING_DESTINATION_KEY).await {
            tracing::warn!("retrying delete of persisted pending destination: {e}");
            if let Err(e) = self.storage.delete(PENDING_DESTINATION_KEY).await {
                tracing::error!("failed to delete persisted pending destination: {e}");
            }
        }
        Some(destination)
    }
}
