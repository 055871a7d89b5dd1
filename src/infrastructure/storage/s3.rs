//! S3 blob store

use std::time::Duration;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::debug;

use crate::config::StorageSettings;
use crate::domain::storage::{BlobContentType, BlobLocation, BlobStore};
use crate::domain::DomainError;

/// Blob store backed by an S3 (or S3-compatible) bucket
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: S3Client,
}

impl S3BlobStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Build a client from settings with a bounded operation timeout
    pub async fn from_settings(settings: &StorageSettings) -> Result<Self, DomainError> {
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(timeout)
            .connect_timeout(timeout)
            .build();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .timeout_config(timeout_config)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self::new(S3Client::from_conf(builder.build())))
    }

    pub fn client(&self) -> &S3Client {
        &self.client
    }
}

fn sdk_error<E, R>(operation: &str, location: &BlobLocation, err: SdkError<E, R>) -> DomainError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::TimeoutError(_) => {
            DomainError::storage(format!("S3 {} {} timed out", operation, location))
        }
        other => DomainError::storage(format!(
            "S3 {} {} failed: {}",
            operation,
            location,
            DisplayErrorContext(&other)
        )),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, location: &BlobLocation) -> Result<Option<Vec<u8>>, DomainError> {
        let result = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    debug!(location = %location, "Key document does not exist yet");
                    return Ok(None);
                }
                return Err(sdk_error("get", location, err));
            }
        };

        let body = output.body.collect().await.map_err(|e| {
            DomainError::storage(format!("Failed to read S3 object {}: {}", location, e))
        })?;

        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn put(
        &self,
        location: &BlobLocation,
        body: Vec<u8>,
        content_type: BlobContentType,
    ) -> Result<(), DomainError> {
        self.client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .content_type(content_type.as_str())
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error("put", location, e))?;

        debug!(location = %location, content_type = content_type.as_str(), "Key document written");
        Ok(())
    }
}
