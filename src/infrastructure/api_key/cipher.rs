//! At-rest encryption of the key document
//!
//! Blobs written with a storage secret look like
//! `KEYGATE_ENCRYPTED_V1:<base64(nonce || ciphertext)>`. Documents written by
//! the earlier heare-auth service carry `HEARE_ENCRYPTED_V1:<fernet token>`
//! and are still readable. Anything without a marker is plaintext JSON, which
//! keeps documents written before encryption was enabled readable.

use std::borrow::Cow;
use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD, engine::general_purpose::URL_SAFE, Engine};
use fernet::Fernet;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::domain::DomainError;

/// Prefix identifying an encrypted key document
pub const ENCRYPTION_MARKER: &[u8] = b"KEYGATE_ENCRYPTED_V1:";

/// Prefix of documents encrypted by heare-auth (Fernet tokens)
pub const LEGACY_ENCRYPTION_MARKER: &[u8] = b"HEARE_ENCRYPTED_V1:";

const NONCE_SIZE: usize = 12;

/// AES-256-GCM cipher keyed by SHA-256 of the storage secret.
///
/// The same digest, base64url encoded, is the Fernet key used to read
/// legacy documents.
pub struct StorageCipher {
    cipher: Aes256Gcm,
    legacy: Option<Fernet>,
}

impl fmt::Debug for StorageCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCipher").finish_non_exhaustive()
    }
}

impl StorageCipher {
    /// Derive the cipher from a storage secret; same secret, same key
    pub fn from_secret(secret: &str) -> Self {
        let mut key_bytes: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

        let mut fernet_key = URL_SAFE.encode(key_bytes);
        let legacy = Fernet::new(&fernet_key);
        key_bytes.zeroize();
        fernet_key.zeroize();

        Self { cipher, legacy }
    }

    /// Encrypt and prepend the marker
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, DomainError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| DomainError::internal(format!("Encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);

        let encoded = STANDARD.encode(&sealed);
        let mut out = Vec::with_capacity(ENCRYPTION_MARKER.len() + encoded.len());
        out.extend_from_slice(ENCRYPTION_MARKER);
        out.extend_from_slice(encoded.as_bytes());

        Ok(out)
    }

    /// Decrypt a payload that has already had the marker stripped
    fn open(&self, payload: &[u8]) -> Result<Vec<u8>, DomainError> {
        let sealed = STANDARD
            .decode(payload.trim_ascii())
            .map_err(|e| DomainError::decryption(format!("invalid base64 payload: {}", e)))?;

        if sealed.len() < NONCE_SIZE {
            return Err(DomainError::decryption(
                "payload is too short to contain a nonce",
            ));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| DomainError::decryption("authentication tag mismatch"))
    }

    /// Decrypt a legacy Fernet token that has already had its marker stripped
    fn open_legacy(&self, payload: &[u8]) -> Result<Vec<u8>, DomainError> {
        let fernet = self
            .legacy
            .as_ref()
            .ok_or_else(|| DomainError::decryption("legacy Fernet key could not be derived"))?;

        let token = std::str::from_utf8(payload.trim_ascii())
            .map_err(|_| DomainError::decryption("legacy payload is not a Fernet token"))?;

        fernet
            .decrypt(token)
            .map_err(|_| DomainError::decryption("invalid legacy Fernet token"))
    }
}

/// Whether `raw` carries either encryption marker
pub fn is_encrypted(raw: &[u8]) -> bool {
    raw.starts_with(ENCRYPTION_MARKER) || raw.starts_with(LEGACY_ENCRYPTION_MARKER)
}

/// Encrypt when a cipher is configured, otherwise pass through
pub fn encode_blob<'a>(
    plaintext: &'a [u8],
    cipher: Option<&StorageCipher>,
) -> Result<Cow<'a, [u8]>, DomainError> {
    match cipher {
        Some(cipher) => Ok(Cow::Owned(cipher.encrypt(plaintext)?)),
        None => Ok(Cow::Borrowed(plaintext)),
    }
}

/// Decrypt marker-prefixed blobs; plaintext passes through unchanged
pub fn decode_blob<'a>(
    raw: &'a [u8],
    cipher: Option<&StorageCipher>,
) -> Result<Cow<'a, [u8]>, DomainError> {
    if let Some(payload) = raw.strip_prefix(ENCRYPTION_MARKER) {
        let cipher = cipher.ok_or(DomainError::EncryptionKeyMissing)?;
        return Ok(Cow::Owned(cipher.open(payload)?));
    }

    if let Some(payload) = raw.strip_prefix(LEGACY_ENCRYPTION_MARKER) {
        let cipher = cipher.ok_or(DomainError::EncryptionKeyMissing)?;
        return Ok(Cow::Owned(cipher.open_legacy(payload)?));
    }

    Ok(Cow::Borrowed(raw))
}
