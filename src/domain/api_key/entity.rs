//! API key record and the stored key document

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Kind of credential held in `secret`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SecretType {
    /// Secret is presented verbatim by the caller
    #[default]
    SharedSecret,
}

/// A single API key as persisted in the key document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Public identifier (`key_...`), safe to log
    pub id: String,
    /// Private credential (`sec_...`), never logged in full
    pub secret: String,
    /// Human-readable label
    pub name: String,
    #[serde(default)]
    pub secret_type: SecretType,
    /// Raw timestamps are kept as text so that a malformed or missing value
    /// never prevents the document from loading; see [`ApiKeyRecord::created`].
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub created_at: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub updated_at: Option<String>,
    /// Raw expiry, interpreted lazily by [`ApiKeyRecord::is_expired_at`]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub expires_at: Option<String>,
    /// Opaque caller metadata, returned verbatim on verification
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ApiKeyRecord {
    /// Create a record with a fresh creation timestamp and no expiry
    pub fn new(id: impl Into<String>, secret: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            name: name.into(),
            secret_type: SecretType::default(),
            created_at: Some(format_timestamp(Utc::now())),
            updated_at: None,
            expires_at: None,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(format_timestamp(expires_at));
        self
    }

    /// Parsed creation time, or `None` when unset or unparsable
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    /// Parsed expiry, or `None` when unset or unparsable
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at.as_deref().and_then(parse_timestamp)
    }

    /// Whether the key expired strictly before `now`.
    ///
    /// An unparsable expiry counts as "never expires".
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry() {
            Some(expiry) => expiry < now,
            None => {
                if let Some(raw) = self.expires_at.as_deref() {
                    tracing::warn!(
                        key_id = %self.id,
                        expires_at = %raw,
                        "Ignoring unparsable expires_at"
                    );
                }
                false
            }
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Short, log-safe prefix of the secret
    pub fn secret_prefix(&self) -> String {
        secret_prefix(&self.secret)
    }
}

/// The full document stored in the blob: `{"keys": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyDocument {
    pub keys: Vec<ApiKeyRecord>,
}

impl KeyDocument {
    pub fn new(keys: Vec<ApiKeyRecord>) -> Self {
        Self { keys }
    }
}

const SECRET_PREFIX_LEN: usize = 4;

/// First four characters of a presented secret, `***` when shorter
pub fn secret_prefix(secret: &str) -> String {
    if secret.chars().count() >= SECRET_PREFIX_LEN {
        secret.chars().take(SECRET_PREFIX_LEN).collect()
    } else {
        "***".to_string()
    }
}

/// RFC 3339 in UTC with a `Z` suffix
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse RFC 3339, falling back to a naive ISO-8601 timestamp read as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Accept any JSON scalar for a timestamp field; non-strings keep their JSON text
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
