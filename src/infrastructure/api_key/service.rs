//! API Key administration service
//!
//! Provides the create/list/delete workflows. Every write reads the full
//! document, changes it, and writes the full document back; a configured
//! refresh endpoint is then poked on a best-effort basis.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::domain::api_key::{validate_key_id, validate_key_name, ApiKeyRecord};
use crate::domain::DomainError;
use crate::infrastructure::side_call::{run_best_effort, SideCallOutcome};

use super::generator::ApiKeyGenerator;
use super::refresh_client::{RefreshClient, RefreshSummary};
use super::store::KeyStore;

const MAX_GENERATION_ATTEMPTS: usize = 5;

/// Input for creating a key
#[derive(Debug, Clone, Default)]
pub struct CreateApiKeyRequest {
    pub name: String,
    pub metadata: Map<String, Value>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateApiKeyRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Result of creating a new API key
#[derive(Debug)]
pub struct CreateApiKeyResult {
    /// The stored record, including the secret (only returned once)
    pub record: ApiKeyRecord,
    /// Outcome of the post-write refresh, if one is configured
    pub refresh: Option<SideCallOutcome<RefreshSummary>>,
}

/// Result of deleting an API key
#[derive(Debug)]
pub struct DeleteApiKeyResult {
    pub record: ApiKeyRecord,
    pub refresh: Option<SideCallOutcome<RefreshSummary>>,
}

/// Administrative operations over the durable key document
#[derive(Debug)]
pub struct ApiKeyService {
    store: Arc<KeyStore>,
    generator: ApiKeyGenerator,
    refresh_client: Option<RefreshClient>,
}

impl ApiKeyService {
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self {
            store,
            generator: ApiKeyGenerator::default(),
            refresh_client: None,
        }
    }

    /// Create with a custom generator
    pub fn with_generator(mut self, generator: ApiKeyGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Poke this refresh endpoint after every successful write
    pub fn with_refresh_client(mut self, refresh_client: Option<RefreshClient>) -> Self {
        self.refresh_client = refresh_client;
        self
    }

    /// Create a new API key
    pub async fn create(
        &self,
        request: CreateApiKeyRequest,
    ) -> Result<CreateApiKeyResult, DomainError> {
        validate_key_name(&request.name)?;

        let mut records = self.store.fetch_records().await?;
        let pair = self.unique_pair(&records)?;

        let mut record =
            ApiKeyRecord::new(pair.id, pair.secret, request.name).with_metadata(request.metadata);

        if let Some(expires_at) = request.expires_at {
            record = record.with_expires_at(expires_at);
        }

        records.push(record.clone());
        self.store.save(&records).await?;

        info!(key_id = %record.id, key_name = %record.name, "API key created");

        Ok(CreateApiKeyResult {
            record,
            refresh: self.trigger_refresh().await,
        })
    }

    /// List every stored key, as the durable document has them
    pub async fn list(&self) -> Result<Vec<ApiKeyRecord>, DomainError> {
        self.store.fetch_records().await
    }

    /// Get a stored key by ID
    pub async fn get(&self, id: &str) -> Result<Option<ApiKeyRecord>, DomainError> {
        Ok(self
            .store
            .fetch_records()
            .await?
            .into_iter()
            .find(|r| r.id == id))
    }

    /// Delete an API key by ID
    pub async fn delete(&self, id: &str) -> Result<DeleteApiKeyResult, DomainError> {
        validate_key_id(id)?;

        let records = self.store.fetch_records().await?;
        let (removed, remaining): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.id == id);

        let Some(record) = removed.into_iter().next() else {
            return Err(DomainError::not_found(format!("API key not found: {}", id)));
        };

        self.store.save(&remaining).await?;

        info!(key_id = %record.id, key_name = %record.name, "API key deleted");

        Ok(DeleteApiKeyResult {
            record,
            refresh: self.trigger_refresh().await,
        })
    }

    fn unique_pair(
        &self,
        existing: &[ApiKeyRecord],
    ) -> Result<super::generator::GeneratedKeyPair, DomainError> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let pair = self.generator.generate();
            let collides = existing
                .iter()
                .any(|r| r.id == pair.id || r.secret == pair.secret);

            if !collides {
                return Ok(pair);
            }
            warn!("Generated key pair collided with an existing key, retrying");
        }

        Err(DomainError::internal(
            "Could not generate a unique key pair",
        ))
    }

    async fn trigger_refresh(&self) -> Option<SideCallOutcome<RefreshSummary>> {
        let client = self.refresh_client.as_ref()?;
        Some(run_best_effort("refresh", client.timeout(), client.trigger()).await)
    }
}
