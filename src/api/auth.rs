//! Login, two-factor and session API handlers

use crate::api::{
    forward_if_remote, route_by_bearer, route_by_token, MessageResponse, SuccessResponse,
};
use crate::domain::{LoginInput, VerifyTwoFactorInput};
use crate::error::{AppError, Result};
use crate::middleware::require_session;
use crate::routing::CapturedRequest;
use crate::state::HasAccounts;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Password login, served by the account's home region.
pub async fn login<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let input: LoginInput = request.json()?;

    // Unknown emails fail exactly like wrong passwords.
    let decision = state
        .region_router()
        .resolve_by_email(&input.email, input.tenant_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => {
                AppError::Unauthorized("Invalid email or password".to_string())
            }
            other => other,
        })?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let outcome = state.session_service().login(input).await?;
    Ok(Json(SuccessResponse::new(outcome)).into_response())
}

pub async fn verify_two_factor<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let input: VerifyTwoFactorInput = request.json()?;
    let decision = route_by_token(&state, &input.token)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let issued = state.session_service().verify_two_factor(input).await?;
    Ok(Json(SuccessResponse::new(issued)).into_response())
}

pub async fn logout<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = route_by_bearer(&state, &request)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = require_session(&state, &request).await?;
    state.session_service().logout(&auth.session_token).await?;
    Ok(Json(MessageResponse::new("Logged out")).into_response())
}

/// Response for session revocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeSessionsResponse {
    pub revoked_count: u64,
}

pub async fn logout_all<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = route_by_bearer(&state, &request)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = require_session(&state, &request).await?;
    let revoked_count = state
        .session_service()
        .logout_all(auth.identity_id())
        .await?;
    Ok(Json(SuccessResponse::new(RevokeSessionsResponse { revoked_count })).into_response())
}

/// List the caller's live sessions, marking the one making this request.
pub async fn list_sessions<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = route_by_bearer(&state, &request)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = require_session(&state, &request).await?;
    let sessions = state
        .session_service()
        .list_sessions(auth.identity_id(), Some(&auth.session.token_value))
        .await?;
    Ok(Json(SuccessResponse::new(sessions)).into_response())
}
