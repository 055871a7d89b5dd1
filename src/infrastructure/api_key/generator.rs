//! API Key generation
//!
//! Generates prefixed public identifiers and high-entropy secrets.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

/// A freshly generated id/secret pair
#[derive(Debug, Clone)]
pub struct GeneratedKeyPair {
    /// Public identifier, safe to log
    pub id: String,
    /// Private credential (only shown once at creation)
    pub secret: String,
}

/// Generator for key ids and secrets
#[derive(Debug, Clone)]
pub struct ApiKeyGenerator {
    id_prefix: String,
    secret_prefix: String,
    id_bytes: usize,
    secret_bytes: usize,
}

impl ApiKeyGenerator {
    pub fn new(id_prefix: impl Into<String>, secret_prefix: impl Into<String>) -> Self {
        Self {
            id_prefix: id_prefix.into(),
            secret_prefix: secret_prefix.into(),
            id_bytes: 16,
            secret_bytes: 32,
        }
    }

    /// Set the number of random bytes in the secret
    pub fn with_secret_bytes(mut self, bytes: usize) -> Self {
        self.secret_bytes = bytes;
        self
    }

    /// Generate a new id/secret pair
    pub fn generate(&self) -> GeneratedKeyPair {
        GeneratedKeyPair {
            id: format!("{}{}", self.id_prefix, random_token(self.id_bytes)),
            secret: format!("{}{}", self.secret_prefix, random_token(self.secret_bytes)),
        }
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(&bytes)
}

impl Default for ApiKeyGenerator {
    fn default() -> Self {
        Self::new("key_", "sec_")
    }
}
