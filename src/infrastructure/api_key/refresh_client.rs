//! Client for the server's `/refresh` endpoint

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::config::RefreshSettings;
use crate::domain::DomainError;

/// Body returned by a successful `/refresh`
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshSummary {
    pub success: bool,
    #[serde(default)]
    pub keys_loaded: usize,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Triggers a reload on a running server
#[derive(Debug, Clone)]
pub struct RefreshClient {
    http_client: Client,
    url: String,
    timeout: Duration,
}

impl RefreshClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: url.into(),
            timeout,
        })
    }

    /// `None` when no refresh URL is configured
    pub fn from_settings(settings: &RefreshSettings) -> Result<Option<Self>, DomainError> {
        match settings.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => Ok(Some(Self::new(
                url,
                Duration::from_secs(settings.timeout_secs.max(1)),
            )?)),
            None => Ok(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST to the refresh endpoint and check that it reported success
    pub async fn trigger(&self) -> Result<RefreshSummary, DomainError> {
        let response = self.http_client.post(&self.url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "Request timed out".to_string()
            } else if e.is_connect() {
                "Connection failed".to_string()
            } else {
                format!("Request failed: {}", e)
            };
            DomainError::internal(format!("Refresh via {} failed: {}", self.url, reason))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::internal(format!(
                "Refresh via {} returned HTTP {}",
                self.url,
                status.as_u16()
            )));
        }

        let summary: RefreshSummary = response.json().await.map_err(|e| {
            DomainError::serialization(format!("Unexpected refresh response: {}", e))
        })?;

        if !summary.success {
            return Err(DomainError::internal(format!(
                "Refresh via {} reported failure",
                self.url
            )));
        }

        info!(url = %self.url, keys_loaded = summary.keys_loaded, "Refresh triggered");
        Ok(summary)
    }
}
