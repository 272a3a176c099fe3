//! Wiring of the session components for one client process.

use std::sync::Arc;

use tokio::sync::Mutex;

use shopfront_cart::CartLedger;

use crate::api::{AuthApi, HttpAuthApi};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::gate::AccessGate;
use crate::machine::AuthSessionMachine;
use crate::store::SessionStore;

/// Everything a front end needs to drive sign-in and guard its views.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ClientConfig,
    pub store: Arc<SessionStore>,
    pub machine: Arc<AuthSessionMachine>,
    pub gate: AccessGate,
    pub cart: Arc<Mutex<CartLedger>>,
}

impl AppState {
    /// Open the configured storage, restore the previous session and talk
    /// to the configured backend over HTTP.
    ///
    /// The restored session is not validated yet; call
    /// [`AuthSessionMachine::validate_session`] once the runtime is up.
    pub async fn new(config: ClientConfig) -> Result<Self, SessionError> {
        let api = HttpAuthApi::new(&config)
            .map_err(|e| SessionError::TransientNetwork(e.to_string()))?;
        Self::with_api(config, Arc::new(api)).await
    }

    /// Same as [`AppState::new`] with a caller-supplied backend.
    pub async fn with_api(config: ClientConfig, api: Arc<dyn AuthApi>) -> Result<Self, SessionError> {
        let storage = config.storage.open()?;
        let store = Arc::new(SessionStore::restore(storage).await?);
        let machine = Arc::new(AuthSessionMachine::new(api, store.clone(), &config));
        let gate = AccessGate::new(store.clone(), config.login_path.clone());

        tracing::info!(api = %config.api_base_url, "session state initialized");

        Ok(Self {
            config,
            store,
            machine,
            gate,
            cart: Arc::new(Mutex::new(CartLedger::new())),
        })
    }

    /// Items in the cart, for the navigation badge.
    pub async fn cart_count(&self) -> u64 {
        self.cart.lock().await.total_count()
    }
}
