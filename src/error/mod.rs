//! Unified error handling for the accounts core

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Tracing target for compensation failures that leave orphaned data behind.
pub const CONSISTENCY_ALERT_TARGET: &str = "consistency_alert";

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Malformed token")]
    MalformedToken,

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// The second write of a cross-store flow failed and its compensation succeeded.
    #[error("Partial failure in {flow}: {message}")]
    PartialFailure { flow: &'static str, message: String },

    /// A compensating write failed. Orphaned data exists until someone reconciles it.
    #[error("Consistency alert in {flow}: {message}")]
    ConsistencyAlert { flow: &'static str, message: String },

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Upstream HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for lookups that must stay indistinguishable to callers.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_) | AppError::Expired(_))
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            // Expired renders exactly like NotFound so token lifetimes do not leak.
            AppError::NotFound(_) | AppError::Expired(_) => (
                StatusCode::NOT_FOUND,
                "not_found",
                "The requested resource was not found".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation", msg.clone())
            }
            AppError::TooManyRequests(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_requests",
                msg.clone(),
            ),
            AppError::MalformedToken => (
                StatusCode::UNAUTHORIZED,
                "malformed_token",
                "Invalid token".to_string(),
            ),
            AppError::UnknownRegion(_) => (
                StatusCode::UNAUTHORIZED,
                "unknown_region",
                "Token issued by an unknown region".to_string(),
            ),
            AppError::PartialFailure { flow, message } => {
                tracing::warn!(flow, "Partial failure, compensation applied: {}", message);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "partial_failure",
                    "The operation could not be completed, please retry".to_string(),
                )
            }
            AppError::ConsistencyAlert { flow, message } => {
                tracing::error!(
                    target: CONSISTENCY_ALERT_TARGET,
                    flow,
                    "Consistency alert reached the HTTP layer: {}",
                    message
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::BadGateway(msg) => {
                tracing::error!("Bad gateway: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "bad_gateway",
                    "Upstream region unavailable".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Http(e) => {
                tracing::error!("Upstream HTTP error: {:?}", e);
                let status = if e.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (
                    status,
                    "bad_gateway",
                    "Upstream region unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

// Conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// True when a sqlx error is a unique-constraint rejection.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
