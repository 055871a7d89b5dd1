//! Application state shared by the handlers

use std::sync::Arc;

use crate::infrastructure::api_key::KeyStore;

/// Holds the one key store the server answers from
#[derive(Debug, Clone)]
pub struct AppState {
    pub key_store: Arc<KeyStore>,
    /// Resolve callers from `X-Forwarded-For` when present
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(key_store: Arc<KeyStore>) -> Self {
        Self {
            key_store,
            trust_forwarded_for: true,
        }
    }

    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}
