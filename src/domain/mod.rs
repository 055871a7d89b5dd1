//! Domain layer - Core entities, errors and collaborator traits

pub mod api_key;
pub mod error;
pub mod storage;

pub use api_key::{ApiKeyRecord, ApiKeyValidationError, KeyDocument, SecretType};
pub use error::DomainError;
pub use storage::{BlobContentType, BlobLocation, BlobStore};
