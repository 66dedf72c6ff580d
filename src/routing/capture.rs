//! Buffered inbound request, kept intact so it can be replayed to another region

use crate::error::{AppError, Result};
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, Method, Uri},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde::de::DeserializeOwned;

/// Largest body accepted before routing.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CapturedRequest {
    /// Parse the buffered body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(AppError::BadRequest("Request body is required".to_string()));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))
    }

    pub fn bearer(&self) -> Option<String> {
        self.headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| auth.token().to_string())
    }

    pub fn require_bearer(&self) -> Result<String> {
        self.bearer()
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))
    }

    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }
}

impl<S> FromRequest<S> for CapturedRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read request body: {}", e)))?;

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        })
    }
}
