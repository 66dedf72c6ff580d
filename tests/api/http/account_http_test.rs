//! Signup and account HTTP API handler tests

use super::{build_test_router, get_json, post_json, put_json, TestAppState};
use accounts_core::api::account::ACCOUNT_ADMIN_ROLE;
use accounts_core::api::{MessageResponse, SuccessResponse};
use accounts_core::domain::{IdentityStatus, Region, StringUuid};
use axum::http::StatusCode;
use serde_json::{json, Value};

async fn signup(app: &axum::Router, body: Value) -> (StatusCode, Option<SuccessResponse<Value>>) {
    post_json(app, "/api/v1/signup", None, &body).await
}

fn token_of(response: &SuccessResponse<Value>) -> String {
    response.data["session_token"].as_str().unwrap().to_string()
}

fn identity_of(response: &SuccessResponse<Value>) -> StringUuid {
    response.data["account"]["identity_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap()
}

/// Sign up and grant the account administrator role.
async fn admin(state: &TestAppState, app: &axum::Router) -> String {
    let (_, body) = signup(app, json!({ "email": "admin@example.com", "password": "pw" })).await;
    let body = body.unwrap();
    state
        .regional
        .add_role(identity_of(&body), ACCOUNT_ADMIN_ROLE)
        .await;
    token_of(&body)
}

// ============================================================================
// Signup Tests
// ============================================================================

#[tokio::test]
async fn test_signup_success() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());

    let (status, body) = signup(
        &app,
        json!({ "email": "alice@example.com", "password": "correct horse" }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let body = body.unwrap();
    assert!(token_of(&body).starts_with("jp."));
    assert_eq!(body.data["account"]["email"], "alice@example.com");
    assert_eq!(body.data["account"]["home_region"], "jp");
    assert!(body.data["account"].get("credential_hash").is_none());
    assert_eq!(state.global.identity_count().await, 1);
}

#[tokio::test]
async fn test_signup_duplicate_email_conflicts() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let body = json!({ "email": "bob@example.com", "password": "pw" });

    let (first, _) = signup(&app, body.clone()).await;
    let (second, _) = signup(&app, body).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(state.regional.account_count().await, 1);
}

#[tokio::test]
async fn test_signup_invalid_email_is_validation_error() {
    let app = build_test_router(TestAppState::new(Region::Jp));

    let (status, _) = signup(&app, json!({ "email": "nope", "password": "pw" })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_signup_malformed_body_is_bad_request() {
    let app = build_test_router(TestAppState::new(Region::Jp));

    let (status, _) = signup(&app, json!({ "password": "pw" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_regional_failure_is_service_unavailable() {
    let state = TestAppState::new(Region::Jp);
    state.regional.faults.fail("create_with_session").await;
    let app = build_test_router(state.clone());

    let (status, body) = post_json::<_, Value>(
        &app,
        "/api/v1/signup",
        None,
        &json!({ "email": "carol@example.com", "password": "pw" }),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.unwrap()["error"], "partial_failure");
    assert_eq!(state.global.identity_count().await, 0);
}

#[tokio::test]
async fn test_signup_organization_returns_challenge() {
    let state = TestAppState::new(Region::Eu);
    let app = build_test_router(state);

    let (status, body): (_, Option<SuccessResponse<Value>>) = post_json(
        &app,
        "/api/v1/signup/organization",
        None,
        &json!({
            "email": "owner@acme-test.example",
            "password": "pw",
            "domain": "acme-test.example"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let data = body.unwrap().data;
    assert!(data["session_token"].as_str().unwrap().starts_with("eu."));
    assert!(data["account"]["tenant_id"].is_string());
    assert_eq!(data["domain"]["status"], "pending");
    assert_eq!(
        data["domain"]["record_name"],
        "_accounts-challenge.acme-test.example"
    );
}

#[tokio::test]
async fn test_signup_organization_ignores_client_tenant_and_proof() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let chosen = StringUuid::new_v4();

    let (status, body): (_, Option<SuccessResponse<Value>>) = post_json(
        &app,
        "/api/v1/signup/organization",
        None,
        &json!({
            "email": "owner@acme-test.example",
            "password": "pw",
            "tenant_id": chosen,
            "domain_proven": true,
            "domain": "acme-test.example"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let data = body.unwrap().data;
    assert_ne!(data["account"]["tenant_id"], json!(chosen));
    assert_eq!(data["domain"]["status"], "pending");
    let stored = state.regional.domain("acme-test.example").await.unwrap();
    assert_eq!(stored.last_verified_at, None);
    assert_ne!(stored.tenant_id, chosen);
}

#[tokio::test]
async fn test_signup_ignores_privileged_fields() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());

    let (status, body) = signup(
        &app,
        json!({
            "email": "eve@example.com",
            "password": "pw",
            "tenant_id": StringUuid::new_v4(),
            "status": "disabled",
            "role_flags": 8,
            "roles": [ACCOUNT_ADMIN_ROLE]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let body = body.unwrap();
    assert!(body.data["account"]["tenant_id"].is_null());
    assert_eq!(body.data["account"]["status"], "active");
    let identity_id = identity_of(&body);
    assert!(state.regional.roles_of(identity_id).await.is_empty());

    let (status, _) = put_json::<_, Value>(
        &app,
        &format!("/api/v1/admin/accounts/{}/status", identity_id),
        Some(&token_of(&body)),
        &json!({ "status": "disabled" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Current Account Tests
// ============================================================================

#[tokio::test]
async fn test_me_returns_account() {
    let app = build_test_router(TestAppState::new(Region::Jp));
    let (_, body) = signup(&app, json!({ "email": "dave@example.com", "password": "pw" })).await;
    let token = token_of(&body.unwrap());

    let (status, body): (_, Option<SuccessResponse<Value>>) =
        get_json(&app, "/api/v1/auth/me", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    let data = body.unwrap().data;
    assert_eq!(data["email"], "dave@example.com");
    assert_eq!(data["status"], "active");
}

#[tokio::test]
async fn test_me_without_bearer_is_unauthorized() {
    let app = build_test_router(TestAppState::new(Region::Jp));

    let (status, _) = get_json::<Value>(&app, "/api/v1/auth/me", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_with_malformed_or_unknown_region_token_is_unauthorized() {
    let app = build_test_router(TestAppState::new(Region::Jp));

    let (malformed, _) = get_json::<Value>(&app, "/api/v1/auth/me", Some("garbage")).await;
    let (unknown, body) = get_json::<Value>(&app, "/api/v1/auth/me", Some("zz.abc")).await;

    assert_eq!(malformed, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(body.unwrap()["error"], "unknown_region");
}

#[tokio::test]
async fn test_me_with_unknown_session_is_unauthorized() {
    let app = build_test_router(TestAppState::new(Region::Jp));

    let (status, _) = get_json::<Value>(&app, "/api/v1/auth/me", Some("jp.no-such-session")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Account Status Tests
// ============================================================================

#[tokio::test]
async fn test_set_status_requires_admin_role() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let (_, admin) = signup(&app, json!({ "email": "admin@example.com", "password": "pw" })).await;
    let (_, target) = signup(&app, json!({ "email": "target@example.com", "password": "pw" })).await;
    let target_id = target.unwrap().data["account"]["identity_id"]
        .as_str()
        .unwrap()
        .to_string();
    let path = format!("/api/v1/admin/accounts/{}/status", target_id);

    let (status, _) = put_json::<_, Value>(
        &app,
        &path,
        Some(&token_of(admin.as_ref().unwrap())),
        &json!({ "status": "disabled" }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_set_status_disables_account() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let admin = admin(&state, &app).await;
    let (_, target) = signup(&app, json!({ "email": "target@example.com", "password": "pw" })).await;
    let target = target.unwrap();
    let target_id = identity_of(&target);

    let (status, body): (_, Option<MessageResponse>) = put_json(
        &app,
        &format!("/api/v1/admin/accounts/{}/status", target_id),
        Some(&admin),
        &json!({ "status": "disabled" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap().message, "Account status updated");
    let account = state.regional.account(target_id).await.unwrap();
    assert_eq!(account.status, IdentityStatus::Disabled);

    // The disabled account's own session stops working.
    let (status, _) = get_json::<Value>(&app, "/api/v1/auth/me", Some(&token_of(&target))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_set_status_for_unknown_identity_is_not_found() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let admin = admin(&state, &app).await;

    let (status, _) = put_json::<_, Value>(
        &app,
        &format!("/api/v1/admin/accounts/{}/status", StringUuid::new_v4()),
        Some(&admin),
        &json!({ "status": "disabled" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Account Provisioning Tests
// ============================================================================

#[tokio::test]
async fn test_provision_account_assigns_tenant_and_roles() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let admin = admin(&state, &app).await;
    let tenant_id = StringUuid::new_v4();

    let (status, body): (_, Option<SuccessResponse<Value>>) = post_json(
        &app,
        "/api/v1/admin/accounts",
        Some(&admin),
        &json!({
            "email": "member@acme-test.example",
            "password": "pw",
            "tenant_id": tenant_id,
            "role_flags": 4,
            "roles": ["recruiter"]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let data = body.unwrap().data;
    assert_eq!(data["tenant_id"], json!(tenant_id));
    assert_eq!(data["home_region"], "jp");
    let identity_id: StringUuid = data["identity_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(
        state.regional.roles_of(identity_id).await,
        vec!["recruiter".to_string()]
    );
}

#[tokio::test]
async fn test_provision_account_requires_admin_role() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let (_, caller) = signup(&app, json!({ "email": "eve@example.com", "password": "pw" })).await;

    let (status, _) = post_json::<_, Value>(
        &app,
        "/api/v1/admin/accounts",
        Some(&token_of(caller.as_ref().unwrap())),
        &json!({
            "email": "member@acme-test.example",
            "password": "pw",
            "tenant_id": StringUuid::new_v4()
        }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(state.regional.account_count().await, 1);
}
