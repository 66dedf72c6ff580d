//! Email change API handlers

use crate::api::{forward_if_remote, route_by_bearer, route_by_token, MessageResponse};
use crate::domain::{ConfirmEmailChangeInput, EmailChangeInput};
use crate::error::Result;
use crate::middleware::require_session;
use crate::routing::CapturedRequest;
use crate::state::HasAccounts;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

pub async fn request_email_change<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = route_by_bearer(&state, &request)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = require_session(&state, &request).await?;
    let input: EmailChangeInput = request.json()?;
    state
        .email_change_service()
        .request_email_change(auth.identity_id(), input)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "A confirmation link has been sent to the new address.",
        )),
    )
        .into_response())
}

pub async fn confirm_email_change<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let input: ConfirmEmailChangeInput = request.json()?;
    let decision = route_by_token(&state, &input.token)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    state
        .email_change_service()
        .confirm_email_change(input)
        .await?;
    Ok(Json(MessageResponse::new("Email address updated.")).into_response())
}
