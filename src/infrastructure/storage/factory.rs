//! Storage factory for runtime backend selection

use std::sync::Arc;

use tracing::info;

use crate::config::StorageSettings;
use crate::domain::storage::BlobStore;
use crate::domain::DomainError;

use super::in_memory::InMemoryBlobStore;
use super::s3::S3BlobStore;

/// Supported blob store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// Amazon S3 or an S3-compatible service
    S3,
    /// Process-local storage (for testing/development)
    InMemory,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "s3" | "aws" | "minio" => Some(Self::S3),
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            _ => None,
        }
    }
}

/// Factory for creating blob store instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates the blob store selected by `settings.backend`
    pub async fn create(settings: &StorageSettings) -> Result<Arc<dyn BlobStore>, DomainError> {
        let storage_type = StorageType::from_str(&settings.backend).ok_or_else(|| {
            DomainError::configuration(format!(
                "Unknown storage backend '{}' (expected 's3' or 'memory')",
                settings.backend
            ))
        })?;

        Self::validate(storage_type, settings)?;
        info!(backend = ?storage_type, bucket = %settings.bucket, key = %settings.key, "Using blob store");

        match storage_type {
            StorageType::S3 => Ok(Arc::new(S3BlobStore::from_settings(settings).await?)),
            StorageType::InMemory => Ok(Arc::new(InMemoryBlobStore::new())),
        }
    }

    fn validate(storage_type: StorageType, settings: &StorageSettings) -> Result<(), DomainError> {
        if settings.key.trim().is_empty() {
            return Err(DomainError::configuration("storage.key must not be empty"));
        }

        if storage_type == StorageType::S3 && settings.bucket.trim().is_empty() {
            return Err(DomainError::configuration(
                "storage.bucket is required for the s3 backend",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!(StorageType::from_str("s3"), Some(StorageType::S3));
        assert_eq!(StorageType::from_str("S3"), Some(StorageType::S3));
        assert_eq!(StorageType::from_str("memory"), Some(StorageType::InMemory));
        assert_eq!(StorageType::from_str("in-memory"), Some(StorageType::InMemory));
        assert_eq!(StorageType::from_str("postgres"), None);
    }

    #[tokio::test]
    async fn test_create_memory_backend() {
        let settings = StorageSettings {
            backend: "memory".to_string(),
            ..StorageSettings::default()
        };

        let store = StorageFactory::create(&settings).await.unwrap();
        let location = crate::domain::BlobLocation::new("", "keys.json");
        assert!(store.get(&location).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_s3_requires_bucket() {
        let settings = StorageSettings::default();

        let err = StorageFactory::create(&settings).await.err().unwrap();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let settings = StorageSettings {
            backend: "ftp".to_string(),
            ..StorageSettings::default()
        };

        let err = StorageFactory::create(&settings).await.err().unwrap();
        assert!(err.to_string().contains("ftp"));
    }
}
