//! Object-store collaborator used by the key store

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::{BlobContentType, BlobLocation};

#[cfg(test)]
use mockall::automock;

/// Minimal object-store interface: whole-blob get and put.
///
/// Implementations own transport timeouts and surface them as
/// [`DomainError::Storage`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the blob; `Ok(None)` when the object does not exist
    async fn get(&self, location: &BlobLocation) -> Result<Option<Vec<u8>>, DomainError>;

    /// Overwrite the blob unconditionally
    async fn put(
        &self,
        location: &BlobLocation,
        body: Vec<u8>,
        content_type: BlobContentType,
    ) -> Result<(), DomainError>;
}
