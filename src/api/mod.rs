//! REST API handlers and shared response types
//!
//! Every handler takes the whole request as a [`CapturedRequest`] so it can be
//! replayed unchanged when another region owns it.

pub mod account;
pub mod auth;
pub mod domain;
pub mod email;
pub mod health;
pub mod metrics;
pub mod password;

use crate::error::Result;
use crate::routing::{CapturedRequest, RouteDecision};
use crate::state::HasAccounts;
use axum::response::Response;
use serde::{Deserialize, Serialize};

/// Success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Message response (for logout, delete, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Route by the region tag of the bearer token.
pub(crate) fn route_by_bearer<S: HasAccounts>(
    state: &S,
    request: &CapturedRequest,
) -> Result<RouteDecision> {
    let bearer = request.require_bearer()?;
    state.region_router().resolve_region(&bearer)
}

/// Route by the region tag of a token carried in the body.
pub(crate) fn route_by_token<S: HasAccounts>(state: &S, token: &str) -> Result<RouteDecision> {
    state.region_router().resolve_region(token)
}

/// Proxy the request when another region owns it; `None` means serve locally.
pub(crate) async fn forward_if_remote<S: HasAccounts>(
    state: &S,
    decision: RouteDecision,
    request: &CapturedRequest,
) -> Result<Option<Response>> {
    match decision {
        RouteDecision::Local => Ok(None),
        RouteDecision::Remote(region) => state
            .forwarder()
            .forward(region, request.clone())
            .await
            .map(Some),
    }
}
