//! Access gate for role-restricted destinations.

use std::sync::Arc;

use shopfront_auth::{Identity, Role, explain_authorization};

use crate::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// Send the caller to the sign-in entry point.
    Deny { redirect_to: String },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    store: Arc<SessionStore>,
    login_path: String,
}

impl AccessGate {
    pub fn new(store: Arc<SessionStore>, login_path: impl Into<String>) -> Self {
        Self {
            store,
            login_path: login_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Decide whether `identity` may see `path`, which requires `required`.
    ///
    /// A denial records `path` as the pending destination (unless it is the
    /// sign-in page itself). An allow has no side effects.
    pub async fn authorize(&self, identity: Option<&Identity>, required: Role, path: &str) -> AccessDecision {
        let explanation = explain_authorization(identity, required);
        tracing::debug!(
            path,
            required = %required,
            granted = explanation.granted,
            reason = %explanation.reason,
            "access decision"
        );

        if explanation.granted {
            return AccessDecision::Allow;
        }

        if path != self.login_path {
            // The redirect still happens; only continuity after sign-in is lost.
            if let Err(err) = self.store.record_pending_destination(path).await {
                tracing::error!(path, "failed to record pending destination: {err}");
            }
        }

        AccessDecision::Deny {
            redirect_to: self.login_path.clone(),
        }
    }

    /// [`AccessGate::authorize`] against the current session. An identity
    /// without a live full credential counts as absent.
    pub async fn guard(&self, path: &str, required: Role) -> AccessDecision {
        let identity = self.store.authenticated_identity().await;
        self.authorize(identity.as_ref(), required, path).await
    }
}
