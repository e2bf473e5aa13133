//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::ProfileStore;
use crate::services::{EmailSender, VerificationService};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; gives access to the profile store and the
/// verification service.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: ProfileStore,
    verification: VerificationService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `store` - Opened profile store
    /// * `sender` - Email delivery used for verification codes
    #[must_use]
    pub fn new(config: ServerConfig, store: ProfileStore, sender: Arc<dyn EmailSender>) -> Self {
        let verification = VerificationService::new(sender, store.clone(), config.verification);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                verification,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the profile store.
    #[must_use]
    pub fn store(&self) -> &ProfileStore {
        &self.inner.store
    }

    /// Get a reference to the verification service.
    #[must_use]
    pub fn verification(&self) -> &VerificationService {
        &self.inner.verification
    }
}
