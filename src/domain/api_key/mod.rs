//! API Key domain
//!
//! Key records, the persisted key document, and validation of
//! administrative input.

mod entity;
mod validation;

pub use entity::{
    format_timestamp, parse_timestamp, secret_prefix, ApiKeyRecord, KeyDocument, SecretType,
};
pub use validation::{
    parse_expires_at, parse_metadata, validate_key_id, validate_key_name, ApiKeyValidationError,
};

use crate::domain::DomainError;

impl From<ApiKeyValidationError> for DomainError {
    fn from(err: ApiKeyValidationError) -> Self {
        DomainError::validation(err.to_string())
    }
}
