//! Validation of administrative input

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while validating administrative input
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiKeyValidationError {
    #[error("API key name cannot be empty")]
    EmptyName,

    #[error("API key name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("API key ID cannot be empty")]
    EmptyId,

    #[error("Invalid JSON in metadata: {0}")]
    InvalidMetadata(String),

    #[error("Metadata must be a JSON object")]
    MetadataNotObject,

    #[error("Invalid timestamp '{0}': expected RFC 3339 (e.g. 2025-01-31T00:00:00Z)")]
    InvalidTimestamp(String),
}

const MAX_KEY_NAME_LENGTH: usize = 200;

/// Validate a key name: non-blank, at most 200 characters
pub fn validate_key_name(name: &str) -> Result<(), ApiKeyValidationError> {
    if name.trim().is_empty() {
        return Err(ApiKeyValidationError::EmptyName);
    }

    if name.chars().count() > MAX_KEY_NAME_LENGTH {
        return Err(ApiKeyValidationError::NameTooLong(MAX_KEY_NAME_LENGTH));
    }

    Ok(())
}

pub fn validate_key_id(id: &str) -> Result<(), ApiKeyValidationError> {
    if id.trim().is_empty() {
        return Err(ApiKeyValidationError::EmptyId);
    }

    Ok(())
}

/// Parse `--metadata` input; it must be a JSON object
pub fn parse_metadata(raw: &str) -> Result<Map<String, Value>, ApiKeyValidationError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ApiKeyValidationError::InvalidMetadata(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiKeyValidationError::MetadataNotObject),
    }
}

/// Parse an administrative expiry timestamp (strict RFC 3339)
pub fn parse_expires_at(raw: &str) -> Result<DateTime<Utc>, ApiKeyValidationError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ApiKeyValidationError::InvalidTimestamp(raw.to_string()))
}
