//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the parsed configuration, the provider factory, and a map of
//! live visitors. Each visitor (one browser, keyed by cookie) owns its own
//! session store and therefore its own provider subscription. The sweep
//! task in `services::visitors` drops visitors that go idle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, ProviderKind};
use crate::identity::firebase::{FirebaseConfig, FirebaseProvider, build_http_client};
use crate::identity::memory::MemoryDirectory;
use crate::identity::{Credentials, IdentityProvider, ProviderError};
use crate::session::SessionStore;
use crate::signin::AuthFlow;

// =============================================================================
// PROVIDER FACTORY
// =============================================================================

/// Builds one identity provider client per visitor.
#[derive(Clone)]
pub enum ProviderFactory {
    Memory(MemoryDirectory),
    Firebase { http: reqwest::Client, config: Arc<FirebaseConfig> },
}

impl ProviderFactory {
    /// # Errors
    ///
    /// Returns an error if the Firebase HTTP client cannot be built.
    pub fn from_config(kind: &ProviderKind) -> Result<Self, ProviderError> {
        match kind {
            ProviderKind::Memory { demo_account } => {
                let directory = MemoryDirectory::new();
                if let Some((email, password)) = demo_account {
                    match directory.register(&Credentials::new(email.as_str(), password.as_str())) {
                        Ok(identity) => info!(uid = %identity.uid, "seeded demo account"),
                        Err(e) => warn!(error = %e, "could not seed demo account"),
                    }
                }
                Ok(Self::Memory(directory))
            }
            ProviderKind::Firebase(config) => {
                Ok(Self::Firebase { http: build_http_client()?, config: Arc::new(config.clone()) })
            }
        }
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn IdentityProvider> {
        match self {
            Self::Memory(directory) => Arc::new(directory.client()),
            Self::Firebase { http, config } => Arc::new(FirebaseProvider::new(http.clone(), Arc::clone(config))),
        }
    }
}

// =============================================================================
// VISITOR STATE
// =============================================================================

/// One browser's live session.
pub struct VisitorState {
    pub store: Arc<SessionStore>,
    /// Last request seen from this visitor. Drives idle eviction.
    pub last_seen: Instant,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub providers: ProviderFactory,
    pub visitors: Arc<RwLock<HashMap<Uuid, VisitorState>>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, providers: ProviderFactory) -> Self {
        Self { config: Arc::new(config), providers, visitors: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// # Errors
    ///
    /// See [`ProviderFactory::from_config`].
    pub fn from_config(config: AppConfig) -> Result<Self, ProviderError> {
        let providers = ProviderFactory::from_config(&config.provider)?;
        Ok(Self::new(config, providers))
    }

    /// A fresh, initialized session store backed by a new provider client.
    #[must_use]
    pub fn new_session_store(&self) -> SessionStore {
        let store = SessionStore::new(self.providers.client(), self.config.session_init_timeout);
        store.initialize();
        store
    }

    #[must_use]
    pub fn auth_flow(&self, store: Arc<SessionStore>) -> AuthFlow {
        AuthFlow::new(store, self.config.default_landing.clone(), self.config.sign_in_observe_timeout)
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
