//! In-memory blob store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::storage::{BlobContentType, BlobLocation, BlobStore};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
struct StoredBlob {
    body: Vec<u8>,
    content_type: BlobContentType,
}

/// Thread-safe in-memory blob store
///
/// Useful for testing and development. Data is lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<BlobLocation, StoredBlob>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with one blob
    pub fn with_blob(location: BlobLocation, body: impl Into<Vec<u8>>) -> Self {
        let store = Self::new();
        store.insert(location, body, BlobContentType::Json);
        store
    }

    /// Writes a blob directly, bypassing the async interface
    pub fn insert(
        &self,
        location: BlobLocation,
        body: impl Into<Vec<u8>>,
        content_type: BlobContentType,
    ) {
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs.insert(
            location,
            StoredBlob {
                body: body.into(),
                content_type,
            },
        );
    }

    /// Raw bytes currently stored at `location`
    pub fn raw(&self, location: &BlobLocation) -> Option<Vec<u8>> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        blobs.get(location).map(|b| b.body.clone())
    }

    /// Content type recorded by the last write to `location`
    pub fn content_type(&self, location: &BlobLocation) -> Option<BlobContentType> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        blobs.get(location).map(|b| b.content_type)
    }

    pub fn remove(&self, location: &BlobLocation) -> bool {
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs.remove(location).is_some()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, location: &BlobLocation) -> Result<Option<Vec<u8>>, DomainError> {
        let blobs = self.blobs.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(blobs.get(location).map(|b| b.body.clone()))
    }

    async fn put(
        &self,
        location: &BlobLocation,
        body: Vec<u8>,
        content_type: BlobContentType,
    ) -> Result<(), DomainError> {
        let mut blobs = self.blobs.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        blobs.insert(location.clone(), StoredBlob { body, content_type });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> BlobLocation {
        BlobLocation::new("test-bucket", "keys.json")
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemoryBlobStore::new();
        assert!(store.get(&location()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryBlobStore::new();

        store
            .put(&location(), b"{\"keys\":[]}".to_vec(), BlobContentType::Json)
            .await
            .unwrap();

        let body = store.get(&location()).await.unwrap().unwrap();
        assert_eq!(body, b"{\"keys\":[]}");
        assert_eq!(store.content_type(&location()), Some(BlobContentType::Json));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryBlobStore::with_blob(location(), "old");

        store
            .put(&location(), b"new".to_vec(), BlobContentType::OctetStream)
            .await
            .unwrap();

        assert_eq!(store.raw(&location()).unwrap(), b"new");
        assert_eq!(
            store.content_type(&location()),
            Some(BlobContentType::OctetStream)
        );
    }

    #[tokio::test]
    async fn test_locations_are_independent() {
        let store = InMemoryBlobStore::with_blob(location(), "a");
        let other = BlobLocation::new("test-bucket", "other.json");

        assert!(store.get(&other).await.unwrap().is_none());
        assert!(store.remove(&location()));
        assert!(store.get(&location()).await.unwrap().is_none());
    }
}
