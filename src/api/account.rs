//! Signup and account API handlers

use crate::api::{forward_if_remote, route_by_bearer, MessageResponse, SuccessResponse};
use crate::domain::{
    AccountView, OrganizationSignupInput, ProvisionAccountInput, SetStatusInput, SignupInput,
    StringUuid,
};
use crate::error::{AppError, Result};
use crate::middleware::require_session;
use crate::routing::{CapturedRequest, RouteDecision};
use crate::state::HasAccounts;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Role allowed to create accounts for others and change their status
pub const ACCOUNT_ADMIN_ROLE: &str = "account_admin";

/// Create an individual account homed in the requested region.
pub async fn signup<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let input: SignupInput = request.json()?;
    let decision = state.region_router().resolve_requested(input.region);
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let outcome = state.orchestrator().signup(input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(outcome))).into_response())
}

/// Create an organization administrator and claim the organization's domain.
pub async fn signup_organization<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let input: OrganizationSignupInput = request.json()?;
    let decision = state.region_router().resolve_requested(input.admin.region);
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let outcome = state.orchestrator().signup_organization(input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(outcome))).into_response())
}

/// Current account
pub async fn me<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = route_by_bearer(&state, &request)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = require_session(&state, &request).await?;
    let view = AccountView::new(auth.account, state.config().region);
    Ok(Json(SuccessResponse::new(view)).into_response())
}

/// Create an account with a chosen tenant and roles in the caller's region.
pub async fn provision_account<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = route_by_bearer(&state, &request)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = require_session(&state, &request).await?;
    require_account_admin(&state, auth.identity_id()).await?;

    let input: ProvisionAccountInput = request.json()?;
    let (account, profile) = input.into_parts();
    let outcome = state.orchestrator().provision(account, profile).await?;

    tracing::info!(
        admin_id = %auth.identity_id(),
        identity_id = %outcome.account.identity_id,
        "Account provisioned by administrator"
    );
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(outcome.account))).into_response())
}

/// Enable or disable an account homed in the caller's region.
pub async fn set_status<S: HasAccounts>(
    State(state): State<S>,
    Path(identity_id): Path<StringUuid>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = route_by_bearer(&state, &request)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = require_session(&state, &request).await?;
    require_account_admin(&state, auth.identity_id()).await?;

    if let RouteDecision::Remote(region) =
        state.region_router().resolve_identity(identity_id).await?
    {
        return Err(AppError::BadRequest(format!(
            "Account is homed in region {}",
            region
        )));
    }

    let input: SetStatusInput = request.json()?;
    state
        .orchestrator()
        .set_status(identity_id, input.status)
        .await?;

    Ok(Json(MessageResponse::new("Account status updated")).into_response())
}

async fn require_account_admin<S: HasAccounts>(state: &S, identity_id: StringUuid) -> Result<()> {
    if !state
        .session_service()
        .has_role(identity_id, ACCOUNT_ADMIN_ROLE)
        .await?
    {
        return Err(AppError::Forbidden("Account admin required".to_string()));
    }
    Ok(())
}
