//! Password reset and change API handlers

use crate::api::{forward_if_remote, route_by_bearer, route_by_token, MessageResponse};
use crate::domain::{ChangePasswordInput, ForgotPasswordInput, ResetPasswordInput};
use crate::error::Result;
use crate::middleware::require_session;
use crate::routing::CapturedRequest;
use crate::state::HasAccounts;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};

const RESET_REQUESTED: &str = "If the email exists, a password reset link has been sent.";

/// Request a reset link. The answer never reveals whether the account exists.
pub async fn forgot_password<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let input: ForgotPasswordInput = request.json()?;

    let decision = match state
        .region_router()
        .resolve_by_email(&input.email, input.tenant_id)
        .await
    {
        Ok(decision) => decision,
        Err(e) if e.is_not_found() => {
            return Ok(Json(MessageResponse::new(RESET_REQUESTED)).into_response());
        }
        Err(e) => return Err(e),
    };
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    state.password_service().request_reset(input).await?;
    Ok(Json(MessageResponse::new(RESET_REQUESTED)).into_response())
}

pub async fn reset_password<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let input: ResetPasswordInput = request.json()?;
    let decision = route_by_token(&state, &input.token)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    state.password_service().reset_password(input).await?;
    Ok(Json(MessageResponse::new("Password has been reset successfully.")).into_response())
}

pub async fn change_password<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = route_by_bearer(&state, &request)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = require_session(&state, &request).await?;
    let input: ChangePasswordInput = request.json()?;
    state
        .password_service()
        .change_password(auth.identity_id(), &auth.session.token_value, input)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully.")).into_response())
}
