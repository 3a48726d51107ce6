//! Health-check handler.

use super::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub build_time: String,
    pub origin: String,
    pub signing_region: String,
}

/// Health check handler
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_time: env!("HWP_BUILD_TIME").to_string(),
        origin: state.origin.hostname.clone(),
        signing_region: state.signing_region.clone(),
    })
}
