use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::logging_middleware;
use super::refresh;
use super::state::AppState;
use super::verify;

/// Create the full router with application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/verify", post(verify::verify_key))
        .route("/refresh", post(refresh::refresh_keys))
        .route("/health", get(health::health_check))
        .route("/health/internal", get(health::internal_health_check))
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}
