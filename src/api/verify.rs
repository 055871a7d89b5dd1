//! `POST /verify`

use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::api::types::Json;
use crate::domain::api_key::secret_prefix;

use super::state::AppState;

/// Error text for every failed verification, expired or unknown alike
pub const INVALID_API_KEY: &str = "Invalid API key";

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub key_id: String,
    pub name: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyFailure {
    pub valid: bool,
    pub error: String,
}

pub async fn verify_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyRequest>,
) -> Response {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    match state.key_store.get_by_secret(&request.api_key) {
        Some(record) => {
            info!(
                event = "verification_success",
                key_id = %record.id,
                key_name = %record.name,
                user_agent = %user_agent,
                "API key verified"
            );

            let response = VerifyResponse {
                valid: true,
                key_id: record.id.clone(),
                name: record.name.clone(),
                metadata: record.metadata.clone(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        None => {
            warn!(
                event = "verification_failed",
                secret_prefix = %secret_prefix(&request.api_key),
                user_agent = %user_agent,
                "API key verification failed"
            );

            let response = VerifyFailure {
                valid: false,
                error: INVALID_API_KEY.to_string(),
            };
            (StatusCode::FORBIDDEN, Json(response)).into_response()
        }
    }
}
