//! In-memory key store backed by a single durable blob
//!
//! The store publishes an immutable [`KeySnapshot`] holding both the
//! secret index and the id index. Reloads build a complete snapshot off to
//! the side and swap it in with one atomic pointer store, so a reader sees
//! either the old pair of indices or the new pair, never a mix.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::StorageSettings;
use crate::domain::api_key::{ApiKeyRecord, KeyDocument};
use crate::domain::storage::{BlobContentType, BlobLocation, BlobStore};
use crate::domain::DomainError;

use super::cipher::{decode_blob, encode_blob, StorageCipher};

/// Immutable view of one loaded key document
#[derive(Debug, Default)]
pub struct KeySnapshot {
    by_secret: HashMap<String, Arc<ApiKeyRecord>>,
    by_id: HashMap<String, Arc<ApiKeyRecord>>,
    loaded_at: Option<DateTime<Utc>>,
}

impl KeySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index `records` by secret and by id.
    ///
    /// Duplicate ids or secrets make the document ambiguous and are rejected.
    pub fn build(records: Vec<ApiKeyRecord>) -> Result<Self, DomainError> {
        let mut by_secret = HashMap::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());

        for record in records {
            let record = Arc::new(record);

            if by_id.insert(record.id.clone(), Arc::clone(&record)).is_some() {
                return Err(DomainError::validation(format!(
                    "Key document contains duplicate id '{}'",
                    record.id
                )));
            }

            if by_secret
                .insert(record.secret.clone(), Arc::clone(&record))
                .is_some()
            {
                return Err(DomainError::validation(format!(
                    "Key document contains a duplicate secret (key id '{}')",
                    record.id
                )));
            }
        }

        Ok(Self {
            by_secret,
            by_id,
            loaded_at: Some(Utc::now()),
        })
    }

    /// Raw secret-index lookup, without expiry evaluation
    pub fn get_by_secret(&self, secret: &str) -> Option<&Arc<ApiKeyRecord>> {
        self.by_secret.get(secret)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Arc<ApiKeyRecord>> {
        self.by_id.get(id)
    }

    /// Every record once, oldest first
    pub fn records(&self) -> Vec<Arc<ApiKeyRecord>> {
        let mut records: Vec<_> = self.by_id.values().cloned().collect();
        records.sort_by(|a, b| a.created().cmp(&b.created()).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Number of distinct secrets, expired ones included
    pub fn len(&self) -> usize {
        self.by_secret.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_secret.is_empty()
    }

    /// When this snapshot was built; `None` for the initial empty snapshot
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

#[derive(Serialize)]
struct KeyDocumentRef<'a> {
    keys: &'a [ApiKeyRecord],
}

/// Authoritative in-memory cache of API keys
pub struct KeyStore {
    backend: Arc<dyn BlobStore>,
    location: BlobLocation,
    cipher: Option<StorageCipher>,
    snapshot: ArcSwap<KeySnapshot>,
    reload_lock: Mutex<()>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("location", &self.location)
            .field("encryption_enabled", &self.encryption_enabled())
            .field("keys", &self.count())
            .finish()
    }
}

impl KeyStore {
    /// Create an empty store reading and writing `location`
    pub fn new(backend: Arc<dyn BlobStore>, location: BlobLocation) -> Self {
        Self {
            backend,
            location,
            cipher: None,
            snapshot: ArcSwap::from_pointee(KeySnapshot::empty()),
            reload_lock: Mutex::new(()),
        }
    }

    /// Enable at-rest encryption with a key derived from `secret`
    pub fn with_storage_secret(mut self, secret: &str) -> Self {
        self.cipher = Some(StorageCipher::from_secret(secret));
        self
    }

    pub fn from_settings(backend: Arc<dyn BlobStore>, settings: &StorageSettings) -> Self {
        let store = Self::new(
            backend,
            BlobLocation::new(settings.bucket.clone(), settings.key.clone()),
        );

        match settings.secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => store.with_storage_secret(secret),
            None => store,
        }
    }

    pub fn location(&self) -> &BlobLocation {
        &self.location
    }

    pub fn encryption_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Read and decode the durable document without publishing it.
    ///
    /// A missing blob yields an empty list.
    pub async fn fetch_records(&self) -> Result<Vec<ApiKeyRecord>, DomainError> {
        Ok(self
            .fetch_document()
            .await?
            .map(|doc| doc.keys)
            .unwrap_or_default())
    }

    async fn fetch_document(&self) -> Result<Option<KeyDocument>, DomainError> {
        let Some(raw) = self.backend.get(&self.location).await? else {
            return Ok(None);
        };

        let plaintext = decode_blob(&raw, self.cipher.as_ref())?;
        let document: KeyDocument = serde_json::from_slice(&plaintext).map_err(|e| {
            DomainError::serialization(format!(
                "Key document {} is not valid: {}",
                self.location, e
            ))
        })?;

        Ok(Some(document))
    }

    /// Re-read the durable document and publish a fresh snapshot.
    ///
    /// Reloads are serialized. On any error the previous snapshot stays
    /// published.
    pub async fn load(&self) -> Result<usize, DomainError> {
        let _guard = self.reload_lock.lock().await;

        let snapshot = match self.fetch_document().await? {
            Some(document) => KeySnapshot::build(document.keys)?,
            None => {
                info!(location = %self.location, "Key document not found, starting empty");
                KeySnapshot {
                    loaded_at: Some(Utc::now()),
                    ..KeySnapshot::empty()
                }
            }
        };

        let count = snapshot.len();
        self.snapshot.store(Arc::new(snapshot));
        debug!(location = %self.location, keys_loaded = count, "Published key snapshot");

        Ok(count)
    }

    /// Overwrite the durable document with `records`
    pub async fn save(&self, records: &[ApiKeyRecord]) -> Result<(), DomainError> {
        let json = serde_json::to_vec_pretty(&KeyDocumentRef { keys: records })?;
        let body = encode_blob(&json, self.cipher.as_ref())?.into_owned();

        let content_type = if self.encryption_enabled() {
            BlobContentType::OctetStream
        } else {
            BlobContentType::Json
        };

        self.backend.put(&self.location, body, content_type).await?;
        info!(location = %self.location, keys = records.len(), encrypted = self.encryption_enabled(), "Saved key document");

        Ok(())
    }

    /// Look up a presented secret; expired keys are treated as absent
    pub fn get_by_secret(&self, secret: &str) -> Option<Arc<ApiKeyRecord>> {
        let snapshot = self.snapshot.load();
        let record = snapshot.get_by_secret(secret)?;

        if record.is_expired() {
            debug!(key_id = %record.id, "Presented secret belongs to an expired key");
            return None;
        }

        Some(Arc::clone(record))
    }

    /// Look up by public id, without expiry evaluation
    pub fn get_by_id(&self, id: &str) -> Option<Arc<ApiKeyRecord>> {
        self.snapshot.load().get_by_id(id).cloned()
    }

    pub fn all_records(&self) -> Vec<Arc<ApiKeyRecord>> {
        self.snapshot.load().records()
    }

    /// Number of secrets in the published snapshot
    pub fn count(&self) -> usize {
        self.snapshot.load().len()
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<KeySnapshot> {
        self.snapshot.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::storage::MockBlobStore;
    use crate::infrastructure::storage::InMemoryBlobStore;
    use chrono::Duration;
    use serde_json::json;

    fn location() -> BlobLocation {
        BlobLocation::new("test-bucket", "keys.json")
    }

    fn record(id: &str, secret: &str, name: &str) -> ApiKeyRecord {
        ApiKeyRecord::new(id, secret, name)
    }

    fn document(records: &[ApiKeyRecord]) -> Vec<u8> {
        serde_json::to_vec(&json!({ "keys": records })).unwrap()
    }

    fn store_with(records: &[ApiKeyRecord]) -> (Arc<InMemoryBlobStore>, KeyStore) {
        let backend = Arc::new(InMemoryBlobStore::with_blob(location(), document(records)));
        let store = KeyStore::new(backend.clone(), location());
        (backend, store)
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = KeyStore::new(Arc::new(InMemoryBlobStore::new()), location());

        assert_eq!(store.count(), 0);
        assert!(store.all_records().is_empty());
        assert!(store.snapshot().loaded_at().is_none());
    }

    #[tokio::test]
    async fn test_load_missing_blob_is_empty() {
        let store = KeyStore::new(Arc::new(InMemoryBlobStore::new()), location());

        assert_eq!(store.load().await.unwrap(), 0);
        assert_eq!(store.count(), 0);
        assert!(store.snapshot().loaded_at().is_some());
    }

    #[tokio::test]
    async fn test_load_indexes_every_record() {
        let records = vec![
            record("key_1", "sec_1", "First"),
            record("key_2", "sec_2", "Second"),
        ];
        let (_, store) = store_with(&records);

        assert_eq!(store.load().await.unwrap(), 2);

        for r in &records {
            assert_eq!(store.get_by_secret(&r.secret).as_deref(), Some(r));
            assert_eq!(store.get_by_id(&r.id).as_deref(), Some(r));
        }
    }

    #[tokio::test]
    async fn test_unknown_secret_and_id() {
        let (_, store) = store_with(&[record("key_1", "sec_1", "First")]);
        store.load().await.unwrap();

        assert!(store.get_by_secret("invalid").is_none());
        assert!(store.get_by_secret("key_1").is_none());
        assert!(store.get_by_id("invalid").is_none());
    }

    #[tokio::test]
    async fn test_expired_key_hidden_from_secret_lookup_only() {
        let expired = record("key_expired", "sec_expired", "Expired Key")
            .with_expires_at(Utc::now() - Duration::hours(1));
        let (_, store) = store_with(&[expired]);
        store.load().await.unwrap();

        assert!(store.get_by_secret("sec_expired").is_none());
        assert!(store.get_by_id("key_expired").is_some());
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_future_and_missing_expiry_are_valid() {
        let future = record("key_valid", "sec_valid", "Valid Key")
            .with_expires_at(Utc::now() + Duration::hours(1));
        let no_expiry = record("key_noexpiry", "sec_noexpiry", "No Expiry Key");
        let (_, store) = store_with(&[future, no_expiry]);
        store.load().await.unwrap();

        assert_eq!(store.get_by_secret("sec_valid").unwrap().id, "key_valid");
        assert_eq!(store.get_by_secret("sec_noexpiry").unwrap().id, "key_noexpiry");
    }

    #[tokio::test]
    async fn test_malformed_expiry_fails_open() {
        let backend = Arc::new(InMemoryBlobStore::with_blob(
            location(),
            serde_json::to_vec(&json!({"keys": [{
                "id": "key_odd",
                "secret": "sec_odd",
                "name": "Odd",
                "created_at": "2024-01-01T00:00:00Z",
                "expires_at": "not-a-date"
            }]}))
            .unwrap(),
        ));
        let store = KeyStore::new(backend, location());
        store.load().await.unwrap();

        assert!(store.get_by_secret("sec_odd").is_some());
    }

    #[tokio::test]
    async fn test_naive_or_missing_created_at_still_loads() {
        let backend = Arc::new(InMemoryBlobStore::with_blob(
            location(),
            serde_json::to_vec(&json!({"keys": [
                {
                    "id": "key_naive",
                    "secret": "sec_naive",
                    "name": "Naive",
                    "created_at": "2024-01-01T00:00:00.123456"
                },
                {
                    "id": "key_bare",
                    "secret": "sec_bare",
                    "name": "Bare"
                },
                {
                    "id": "key_ok",
                    "secret": "sec_ok",
                    "name": "Ok",
                    "created_at": "2024-02-01T00:00:00Z"
                }
            ]}))
            .unwrap(),
        ));
        let store = KeyStore::new(backend, location());

        assert_eq!(store.load().await.unwrap(), 3);
        assert!(store.get_by_secret("sec_ok").is_some());
        assert!(store.get_by_secret("sec_naive").is_some());
        assert!(store.get_by_secret("sec_bare").is_some());

        let ids: Vec<String> = store.all_records().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["key_bare", "key_naive", "key_ok"]);
    }

    #[tokio::test]
    async fn test_reads_heare_encrypted_document() {
        use crate::infrastructure::api_key::cipher::legacy_fixture;

        let backend = Arc::new(InMemoryBlobStore::with_blob(location(), legacy_fixture::BLOB));
        let store =
            KeyStore::new(backend.clone(), location()).with_storage_secret(legacy_fixture::SECRET);

        assert_eq!(store.load().await.unwrap(), 1);
        assert_eq!(store.get_by_secret("sec_legacy").unwrap().name, "legacy");

        // the next write switches the document to the current format
        let records = store.fetch_records().await.unwrap();
        store.save(&records).await.unwrap();
        let raw = backend.raw(&location()).unwrap();
        assert!(raw.starts_with(crate::infrastructure::api_key::ENCRYPTION_MARKER));
        assert_eq!(store.load().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_heare_encrypted_document_without_secret() {
        use crate::infrastructure::api_key::cipher::legacy_fixture;

        let backend = Arc::new(InMemoryBlobStore::with_blob(location(), legacy_fixture::BLOB));
        let store = KeyStore::new(backend, location());

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, DomainError::EncryptionKeyMissing));
    }

    #[tokio::test]
    async fn test_all_records_once_each() {
        let (_, store) = store_with(&[
            record("key_1", "sec_1", "Key 1"),
            record("key_2", "sec_2", "Key 2"),
        ]);
        store.load().await.unwrap();

        let ids: Vec<String> = store.all_records().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"key_1".to_string()));
        assert!(ids.contains(&"key_2".to_string()));
    }

    #[tokio::test]
    async fn test_reload_replaces_snapshot_wholesale() {
        let (backend, store) = store_with(&[record("key_old", "sec_old", "Old")]);
        store.load().await.unwrap();

        backend.insert(
            location(),
            document(&[record("key_new", "sec_new", "New")]),
            BlobContentType::Json,
        );
        assert_eq!(store.load().await.unwrap(), 1);

        assert!(store.get_by_secret("sec_old").is_none());
        assert!(store.get_by_id("key_old").is_none());
        assert!(store.get_by_secret("sec_new").is_some());
    }

    #[tokio::test]
    async fn test_save_then_load_plaintext() {
        let backend = Arc::new(InMemoryBlobStore::new());
        let store = KeyStore::new(backend.clone(), location());

        store.save(&[record("key_1", "sec_1", "First")]).await.unwrap();

        assert_eq!(backend.content_type(&location()), Some(BlobContentType::Json));
        let raw = String::from_utf8(backend.raw(&location()).unwrap()).unwrap();
        assert!(raw.starts_with('{'));
        assert!(raw.contains("\n  \"keys\""));

        assert_eq!(store.load().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_then_load_encrypted() {
        let backend = Arc::new(InMemoryBlobStore::new());
        let store = KeyStore::new(backend.clone(), location()).with_storage_secret("s3cret");

        store.save(&[record("key_1", "sec_1", "First")]).await.unwrap();

        assert_eq!(
            backend.content_type(&location()),
            Some(BlobContentType::OctetStream)
        );
        let raw = backend.raw(&location()).unwrap();
        assert!(crate::infrastructure::api_key::is_encrypted(&raw));
        assert!(!String::from_utf8_lossy(&raw).contains("sec_1"));

        assert_eq!(store.load().await.unwrap(), 1);
        assert!(store.get_by_secret("sec_1").is_some());
    }

    #[tokio::test]
    async fn test_encrypted_store_reads_legacy_plaintext() {
        let backend = Arc::new(InMemoryBlobStore::with_blob(
            location(),
            document(&[record("key_1", "sec_1", "Legacy")]),
        ));
        let store = KeyStore::new(backend, location()).with_storage_secret("s3cret");

        assert_eq!(store.load().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_encrypted_blob_without_secret_keeps_prior_snapshot() {
        let backend = Arc::new(InMemoryBlobStore::with_blob(
            location(),
            document(&[record("key_1", "sec_1", "Plain")]),
        ));
        let store = KeyStore::new(backend.clone(), location());
        store.load().await.unwrap();

        let writer = KeyStore::new(backend.clone(), location()).with_storage_secret("s3cret");
        writer.save(&[record("key_2", "sec_2", "Secret")]).await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, DomainError::EncryptionKeyMissing));
        assert!(store.get_by_secret("sec_1").is_some());
        assert!(store.get_by_secret("sec_2").is_none());
    }

    #[tokio::test]
    async fn test_wrong_secret_is_distinguished() {
        let backend = Arc::new(InMemoryBlobStore::new());
        KeyStore::new(backend.clone(), location())
            .with_storage_secret("right")
            .save(&[record("key_1", "sec_1", "First")])
            .await
            .unwrap();

        let store = KeyStore::new(backend, location()).with_storage_secret("wrong");
        let err = store.load().await.unwrap_err();

        assert!(matches!(err, DomainError::Decryption { .. }));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_json_keeps_prior_snapshot() {
        let (backend, store) = store_with(&[record("key_1", "sec_1", "First")]);
        store.load().await.unwrap();

        backend.insert(location(), "{\"keys\": [", BlobContentType::Json);

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, DomainError::Serialization { .. }));
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_secret_rejected() {
        let (_, store) = store_with(&[
            record("key_1", "sec_same", "One"),
            record("key_2", "sec_same", "Two"),
        ]);

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
        assert!(!err.to_string().contains("sec_same"));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let (_, store) = store_with(&[
            record("key_same", "sec_1", "One"),
            record("key_same", "sec_2", "Two"),
        ]);

        assert!(matches!(
            store.load().await,
            Err(DomainError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_prior_snapshot() {
        let mut backend = MockBlobStore::new();
        let mut seq = mockall::Sequence::new();

        let body = document(&[record("key_1", "sec_1", "First")]);
        backend
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(body.clone())));
        backend
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DomainError::storage("connection reset")));

        let store = KeyStore::new(Arc::new(backend), location());

        assert_eq!(store.load().await.unwrap(), 1);
        let err = store.load().await.unwrap_err();

        assert!(matches!(err, DomainError::Storage { .. }));
        assert!(store.get_by_secret("sec_1").is_some());
    }

    #[tokio::test]
    async fn test_save_writes_full_document_with_content_type() {
        let mut backend = MockBlobStore::new();
        backend
            .expect_put()
            .withf(|location, body, content_type| {
                let doc: KeyDocument = serde_json::from_slice(body).unwrap();
                location.key == "keys.json"
                    && *content_type == BlobContentType::Json
                    && doc.keys.len() == 2
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let store = KeyStore::new(Arc::new(backend), location());
        store
            .save(&[record("key_1", "sec_1", "One"), record("key_2", "sec_2", "Two")])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_save_failure_propagates() {
        let mut backend = MockBlobStore::new();
        backend
            .expect_put()
            .returning(|_, _, _| Err(DomainError::storage("S3 put timed out")));

        let store = KeyStore::new(Arc::new(backend), location());
        let err = store.save(&[]).await.unwrap_err();

        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_from_settings_enables_encryption() {
        let backend: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());

        let plain = KeyStore::from_settings(backend.clone(), &StorageSettings::default());
        assert!(!plain.encryption_enabled());

        let settings = StorageSettings {
            bucket: "auth-bucket".to_string(),
            secret: Some("s3cret".to_string()),
            ..StorageSettings::default()
        };
        let encrypted = KeyStore::from_settings(backend, &settings);
        assert!(encrypted.encryption_enabled());
        assert_eq!(encrypted.location().bucket, "auth-bucket");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_observe_mixed_snapshot() {
        let small = document(&[record("key_a", "sec_a", "A")]);
        let large = document(&[
            record("key_b1", "sec_b1", "B1"),
            record("key_b2", "sec_b2", "B2"),
            record("key_b3", "sec_b3", "B3"),
        ]);

        let backend = Arc::new(InMemoryBlobStore::with_blob(location(), small.clone()));
        let store = Arc::new(KeyStore::new(backend.clone(), location()));
        store.load().await.unwrap();

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..200 {
                    let body = if i % 2 == 0 { large.clone() } else { small.clone() };
                    backend.insert(location(), body, BlobContentType::Json);
                    store.load().await.unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    for _ in 0..500 {
                        let snapshot = store.snapshot();
                        let records = snapshot.records();

                        assert_eq!(records.len(), snapshot.len());
                        assert!(records.len() == 1 || records.len() == 3);

                        for r in &records {
                            let by_secret = snapshot.get_by_secret(&r.secret).unwrap();
                            assert!(Arc::ptr_eq(by_secret, r));
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in futures::future::join_all(readers).await {
            reader.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reloads_are_serialized() {
        let (_, store) = store_with(&[
            record("key_1", "sec_1", "One"),
            record("key_2", "sec_2", "Two"),
        ]);
        let store = Arc::new(store);

        let reloads: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.load().await })
            })
            .collect();

        for result in futures::future::join_all(reloads).await {
            assert_eq!(result.unwrap().unwrap(), 2);
        }
        assert_eq!(store.count(), 2);
    }
}
