//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::api::types::{ApiError, Json};
use crate::domain::api_key::format_timestamp;

use super::client_addr::ClientAddr;
use super::state::AppState;

/// Public health body; carries no operational detail
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Loopback-only health body
#[derive(Debug, Serialize, Deserialize)]
pub struct InternalHealthResponse {
    pub status: String,
    pub keys_count: usize,
    pub loaded_at: Option<String>,
}

/// Returns 200 while the process is serving
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Same as `/health` plus the size and age of the published snapshot
pub async fn internal_health_check(
    State(state): State<AppState>,
    client: ClientAddr,
) -> Result<Json<InternalHealthResponse>, ApiError> {
    if !client.is_loopback() {
        return Err(ApiError::forbidden(
            "Internal health is only available from localhost",
        ));
    }

    let snapshot = state.key_store.snapshot();

    Ok(Json(InternalHealthResponse {
        status: "ok".to_string(),
        keys_count: snapshot.len(),
        loaded_at: snapshot.loaded_at().map(format_timestamp),
    }))
}
