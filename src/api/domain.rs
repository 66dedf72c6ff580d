//! Tenant domain API handlers
//!
//! Collection routes follow the caller's bearer token. Routes naming a domain
//! follow the region holding its claim, and the caller must be a member of the
//! owning tenant there.

use crate::api::{forward_if_remote, route_by_bearer, MessageResponse, SuccessResponse};
use crate::domain::ClaimDomainInput;
use crate::error::{AppError, Result};
use crate::middleware::{require_session, SessionAuth};
use crate::routing::{CapturedRequest, RouteDecision};
use crate::state::HasAccounts;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

pub async fn claim_domain<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = route_by_bearer(&state, &request)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = require_session(&state, &request).await?;
    let tenant_id = auth.tenant_id()?;
    let input: ClaimDomainInput = request.json()?;
    input.validate()?;

    let challenge = state
        .orchestrator()
        .claim_domain(tenant_id, &input.domain)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(challenge))).into_response())
}

pub async fn list_domains<S: HasAccounts>(
    State(state): State<S>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = route_by_bearer(&state, &request)?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = require_session(&state, &request).await?;
    let challenges = state
        .domain_verification_service()
        .list(auth.tenant_id()?)
        .await?;
    Ok(Json(SuccessResponse::new(challenges)).into_response())
}

pub async fn get_domain<S: HasAccounts>(
    State(state): State<S>,
    Path(domain): Path<String>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = state.region_router().resolve_domain(&domain).await?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = domain_session(&state, &request).await?;
    let challenge = state
        .domain_verification_service()
        .get(auth.tenant_id()?, &domain)
        .await?;
    Ok(Json(SuccessResponse::new(challenge)).into_response())
}

/// Run one DNS ownership check.
pub async fn verify_domain<S: HasAccounts>(
    State(state): State<S>,
    Path(domain): Path<String>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = state.region_router().resolve_domain(&domain).await?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = domain_session(&state, &request).await?;
    let outcome = state
        .domain_verification_service()
        .verify_domain(auth.tenant_id()?, &domain)
        .await?;
    Ok(Json(SuccessResponse::new(outcome)).into_response())
}

pub async fn delete_domain<S: HasAccounts>(
    State(state): State<S>,
    Path(domain): Path<String>,
    request: CapturedRequest,
) -> Result<Response> {
    let decision = state.region_router().resolve_domain(&domain).await?;
    if let Some(response) = forward_if_remote(&state, decision, &request).await? {
        return Ok(response);
    }

    let auth = domain_session(&state, &request).await?;
    state
        .orchestrator()
        .remove_domain(auth.tenant_id()?, &domain)
        .await?;
    Ok(Json(MessageResponse::new("Domain removed")).into_response())
}

/// Sessions live in the member's home region, which is the claim's region
/// for every member of the owning tenant.
async fn domain_session<S: HasAccounts>(
    state: &S,
    request: &CapturedRequest,
) -> Result<SessionAuth> {
    if let RouteDecision::Remote(region) = route_by_bearer(state, request)? {
        return Err(AppError::Forbidden(format!(
            "Session from region {} cannot manage domains claimed here",
            region
        )));
    }
    require_session(state, request).await
}
