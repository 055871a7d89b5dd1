//! Keygate
//!
//! API key issuance and verification backed by a single JSON document in
//! object storage:
//! - In-memory key store with atomic reload and expiry checks
//! - Optional AES-256-GCM encryption of the stored document
//! - HTTP verification service and admin CLI

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use api::state::AppState;
use config::StorageSettings;
use infrastructure::api_key::KeyStore;
use infrastructure::storage::StorageFactory;

/// Build the key store described by `settings` without loading it
pub async fn create_key_store(settings: &StorageSettings) -> anyhow::Result<Arc<KeyStore>> {
    let backend = StorageFactory::create(settings)
        .await
        .context("Failed to create blob store")?;

    Ok(Arc::new(KeyStore::from_settings(backend, settings)))
}

/// Create the application state, loading the key document once.
///
/// A failed initial load aborts startup.
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let key_store = create_key_store(&config.storage).await?;

    let keys_loaded = key_store.load().await.map_err(|e| {
        error!(event = "startup", error = %e, "Initial key load failed");
        anyhow::anyhow!("Failed to load API keys from {}: {}", key_store.location(), e)
    })?;

    info!(
        event = "startup",
        keys_loaded,
        location = %key_store.location(),
        encrypted = key_store.encryption_enabled(),
        "Key store ready"
    );

    Ok(AppState::new(key_store).with_trust_forwarded_for(config.server.trust_forwarded_for))
}
