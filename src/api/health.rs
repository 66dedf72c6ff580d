//! Health check endpoints

use crate::state::HasAccounts;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub region: String,
}

/// Health check endpoint
pub async fn health<S: HasAccounts>(State(state): State<S>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        region: state.config().region.to_string(),
    })
}

/// Readiness check endpoint: both the Global Directory and the regional store must answer.
pub async fn ready<S: HasAccounts>(State(state): State<S>) -> impl IntoResponse {
    let (global_ok, regional_ok) = state.check_ready().await;

    if global_ok && regional_ok {
        (StatusCode::OK, "ready")
    } else {
        tracing::warn!(global_ok, regional_ok, "Readiness check failed");
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    }
}
