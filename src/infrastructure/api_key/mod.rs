//! API Key infrastructure implementations
//!
//! This module provides the serving key store, at-rest encryption of the
//! key document, key generation, and the administrative workflows.

mod cipher;
mod generator;
mod refresh_client;
mod service;
mod store;

pub use cipher::{
    decode_blob, encode_blob, is_encrypted, StorageCipher, ENCRYPTION_MARKER,
    LEGACY_ENCRYPTION_MARKER,
};
pub use generator::{ApiKeyGenerator, GeneratedKeyPair};
pub use refresh_client::{RefreshClient, RefreshSummary};
pub use service::{ApiKeyService, CreateApiKeyRequest, CreateApiKeyResult, DeleteApiKeyResult};
pub use store::{KeySnapshot, KeyStore};
