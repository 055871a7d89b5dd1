//! Blob coordinates and payload types

use std::fmt;

/// Bucket/key pair addressing the single key document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobLocation {
    pub bucket: String,
    pub key: String,
}

impl BlobLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Content type recorded on write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobContentType {
    /// Plaintext key document
    Json,
    /// Encrypted key document
    OctetStream,
}

impl BlobContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let location = BlobLocation::new("auth-bucket", "keys.json");
        assert_eq!(location.to_string(), "auth-bucket/keys.json");
    }

    #[test]
    fn test_content_type_strings() {
        assert_eq!(BlobContentType::Json.as_str(), "application/json");
        assert_eq!(
            BlobContentType::OctetStream.as_str(),
            "application/octet-stream"
        );
    }
}
