//! Tenant domain HTTP API handler tests

use super::{build_test_router, delete_json, get_json, post_json, TestAppState};
use crate::api::orchestrator_test::{member_profile, signup_input};
use accounts_core::api::{MessageResponse, SuccessResponse};
use accounts_core::domain::{DomainChallenge, Region, StringUuid, VerificationOutcome, VerificationStatus};
use axum::http::StatusCode;
use axum::Router;
use serde_json::{json, Value};

/// Provision a member of `tenant_id` and return its session token.
async fn member(state: &TestAppState, email: &str, tenant_id: StringUuid) -> String {
    state
        .orchestrator
        .provision(signup_input(email), member_profile(tenant_id))
        .await
        .unwrap()
        .session_token
}

async fn claim(app: &Router, token: &str, domain: &str) -> (StatusCode, Option<SuccessResponse<DomainChallenge>>) {
    post_json(app, "/api/v1/domains", Some(token), &json!({ "domain": domain })).await
}

#[tokio::test]
async fn test_claim_list_and_get_domain() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let token = member(&state, "owner@acme-test.example", StringUuid::new_v4()).await;

    let (status, body) = claim(&app, &token, "Acme-Test.Example").await;
    assert_eq!(status, StatusCode::CREATED);
    let challenge = body.unwrap().data;
    assert_eq!(challenge.domain, "acme-test.example");
    assert_eq!(challenge.status, VerificationStatus::Pending);
    assert_eq!(state.global.claims().await[0].region, Region::Jp);

    let (status, body): (_, Option<SuccessResponse<Vec<DomainChallenge>>>) =
        get_json(&app, "/api/v1/domains", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap().data.len(), 1);

    let (status, body): (_, Option<SuccessResponse<DomainChallenge>>) =
        get_json(&app, "/api/v1/domains/acme-test.example", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap().data.record_value, challenge.record_value);
}

#[tokio::test]
async fn test_claim_taken_domain_conflicts() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let first = member(&state, "a@one.example", StringUuid::new_v4()).await;
    let second = member(&state, "b@two.example", StringUuid::new_v4()).await;

    let (status, _) = claim(&app, &first, "shared.example").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = claim(&app, &second, "shared.example").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_claim_without_tenant_is_forbidden() {
    let app = build_test_router(TestAppState::new(Region::Jp));
    let (_, body): (_, Option<SuccessResponse<Value>>) = post_json(
        &app,
        "/api/v1/signup",
        None,
        &json!({ "email": "solo@example.com", "password": "pw" }),
    )
    .await;
    let token = body.unwrap().data["session_token"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = claim(&app, &token, "solo.example").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_verify_domain_and_cooldown() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let token = member(&state, "owner@acme-test.example", StringUuid::new_v4()).await;
    let (_, body) = claim(&app, &token, "acme-test.example").await;
    let challenge = body.unwrap().data;
    state
        .resolver
        .publish(&challenge.record_name, &challenge.record_value)
        .await;

    let (status, body): (_, Option<SuccessResponse<VerificationOutcome>>) = post_json(
        &app,
        "/api/v1/domains/acme-test.example/verify",
        Some(&token),
        &json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let outcome = body.unwrap().data;
    assert_eq!(outcome.status, VerificationStatus::Verified);
    assert!(outcome.next_request_at.is_some());

    let (status, _) = post_json::<_, Value>(
        &app,
        "/api/v1/domains/acme-test.example/verify",
        Some(&token),
        &json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_other_tenant_cannot_see_domain() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let owner = member(&state, "owner@acme-test.example", StringUuid::new_v4()).await;
    let outsider = member(&state, "eve@elsewhere.example", StringUuid::new_v4()).await;
    claim(&app, &owner, "acme-test.example").await;

    let (get, _) = get_json::<Value>(&app, "/api/v1/domains/acme-test.example", Some(&outsider)).await;
    let (delete, _) =
        delete_json::<Value>(&app, "/api/v1/domains/acme-test.example", Some(&outsider)).await;

    assert_eq!(get, StatusCode::NOT_FOUND);
    assert_eq!(delete, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unclaimed_domain_is_not_found() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let token = member(&state, "owner@acme-test.example", StringUuid::new_v4()).await;

    let (status, _) = get_json::<Value>(&app, "/api/v1/domains/nobody.example", Some(&token)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_domain_releases_claim() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let token = member(&state, "owner@acme-test.example", StringUuid::new_v4()).await;
    claim(&app, &token, "acme-test.example").await;

    let (status, body): (_, Option<MessageResponse>) =
        delete_json(&app, "/api/v1/domains/acme-test.example", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap().message, "Domain removed");
    assert!(state.global.claims().await.is_empty());
    assert!(state.regional.domain("acme-test.example").await.is_none());

    // Released names can be claimed again.
    let (status, _) = claim(&app, &token, "acme-test.example").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_remote_session_cannot_manage_local_domain() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let token = member(&state, "owner@acme-test.example", StringUuid::new_v4()).await;
    claim(&app, &token, "acme-test.example").await;

    let (status, _) = get_json::<Value>(
        &app,
        "/api/v1/domains/acme-test.example",
        Some("us.some-session"),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_self_signup_cannot_join_existing_tenant() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let victim_tenant = StringUuid::new_v4();
    let owner = member(&state, "owner@acme-test.example", victim_tenant).await;
    claim(&app, &owner, "acme-test.example").await;

    let (status, body): (_, Option<SuccessResponse<Value>>) = post_json(
        &app,
        "/api/v1/signup",
        None,
        &json!({
            "email": "mallory@evil.example",
            "password": "pw",
            "tenant_id": victim_tenant,
            "roles": ["account_admin"],
            "role_flags": 8
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let data = body.unwrap().data;
    assert!(data["account"]["tenant_id"].is_null());
    let intruder = data["session_token"].as_str().unwrap().to_string();

    let (get, _) = get_json::<Value>(&app, "/api/v1/domains/acme-test.example", Some(&intruder)).await;
    let (delete, _) =
        delete_json::<Value>(&app, "/api/v1/domains/acme-test.example", Some(&intruder)).await;

    assert_eq!(get, StatusCode::FORBIDDEN);
    assert_eq!(delete, StatusCode::FORBIDDEN);
    assert!(state.regional.domain("acme-test.example").await.is_some());
    assert_eq!(state.global.claims().await.len(), 1);
}
