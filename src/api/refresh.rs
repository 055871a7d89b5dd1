//! `POST /refresh` - reload the key document, localhost only

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::types::{ApiError, Json};
use crate::domain::api_key::format_timestamp;

use super::client_addr::ClientAddr;
use super::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub keys_loaded: usize,
    pub timestamp: String,
}

pub async fn refresh_keys(
    State(state): State<AppState>,
    client: ClientAddr,
) -> Result<Json<RefreshResponse>, ApiError> {
    if !client.is_loopback() {
        warn!(
            event = "refresh_rejected",
            client_host = %client.client_host(),
            forwarded_for = client.forwarded_for.as_deref().unwrap_or(""),
            "Refresh rejected for non-local caller"
        );
        return Err(ApiError::forbidden("Refresh is only allowed from localhost"));
    }

    match state.key_store.load().await {
        Ok(keys_loaded) => {
            info!(event = "refresh_success", keys_loaded, "Keys reloaded");

            Ok(Json(RefreshResponse {
                success: true,
                keys_loaded,
                timestamp: format_timestamp(Utc::now()),
            }))
        }
        Err(e) => {
            // previous snapshot stays published
            error!(event = "refresh_failed", error = %e, "Key reload failed");
            Err(ApiError::internal(format!("Failed to reload keys: {}", e)))
        }
    }
}
