//! Login, session, password and email-change HTTP API handler tests

use super::{build_test_router, get_json, post_json, TestAppState};
use accounts_core::api::auth::RevokeSessionsResponse;
use accounts_core::api::{MessageResponse, SuccessResponse};
use accounts_core::domain::{NotificationKind, Region, SessionInfo};
use axum::http::StatusCode;
use axum::Router;
use serde_json::{json, Value};

async fn signed_up(app: &Router, email: &str, extra: Value) -> String {
    let mut body = json!({ "email": email, "password": "pw" });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        body.extend(extra.clone());
    }
    let (status, response): (_, Option<SuccessResponse<Value>>) =
        post_json(app, "/api/v1/signup", None, &body).await;
    assert_eq!(status, StatusCode::CREATED);
    response.unwrap().data["session_token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Option<SuccessResponse<Value>>) {
    post_json(
        app,
        "/api/v1/auth/login",
        None,
        &json!({ "email": email, "password": password }),
    )
    .await
}

async fn notified(state: &TestAppState, kind: NotificationKind, field: &str) -> String {
    let outbox = state.regional.outbox().await;
    let notification = outbox.iter().rev().find(|n| n.kind == kind).unwrap();
    notification.payload[field].as_str().unwrap().to_string()
}

// ============================================================================
// Login Tests
// ============================================================================

#[tokio::test]
async fn test_login_success() {
    let app = build_test_router(TestAppState::new(Region::Jp));
    signed_up(&app, "alice@example.com", json!({})).await;

    let (status, body) = login(&app, "alice@example.com", "pw").await;

    assert_eq!(status, StatusCode::OK);
    let data = body.unwrap().data;
    assert_eq!(data["status"], "authenticated");
    assert!(data["session_token"].as_str().unwrap().starts_with("jp."));
}

#[tokio::test]
async fn test_login_unknown_email_matches_wrong_password() {
    let app = build_test_router(TestAppState::new(Region::Jp));
    signed_up(&app, "bob@example.com", json!({})).await;

    let (wrong, wrong_body) = post_json::<_, Value>(
        &app,
        "/api/v1/auth/login",
        None,
        &json!({ "email": "bob@example.com", "password": "bad" }),
    )
    .await;
    let (unknown, unknown_body) = post_json::<_, Value>(
        &app,
        "/api/v1/auth/login",
        None,
        &json!({ "email": "ghost@example.com", "password": "bad" }),
    )
    .await;

    assert_eq!(wrong, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn test_two_factor_login_flow() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    signed_up(&app, "carol@example.com", json!({ "two_factor_enabled": true })).await;

    let (status, body) = login(&app, "carol@example.com", "pw").await;
    assert_eq!(status, StatusCode::OK);
    let data = body.unwrap().data;
    assert_eq!(data["status"], "two_factor_required");
    let token = data["two_factor_token"].as_str().unwrap().to_string();
    let code = notified(&state, NotificationKind::TwoFactorCode, "code").await;

    let verify = json!({ "token": token, "code": code });
    let (first, first_body): (_, Option<SuccessResponse<Value>>) =
        post_json(&app, "/api/v1/auth/two-factor", None, &verify).await;
    let (second, second_body): (_, Option<SuccessResponse<Value>>) =
        post_json(&app, "/api/v1/auth/two-factor", None, &verify).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_ne!(
        first_body.unwrap().data["session_token"],
        second_body.unwrap().data["session_token"]
    );
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_list_sessions_marks_current() {
    let app = build_test_router(TestAppState::new(Region::Jp));
    let token = signed_up(&app, "dave@example.com", json!({})).await;
    login(&app, "dave@example.com", "pw").await;

    let (status, body): (_, Option<SuccessResponse<Vec<SessionInfo>>>) =
        get_json(&app, "/api/v1/auth/sessions", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    let sessions = body.unwrap().data;
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions.iter().filter(|s| s.is_current).count(), 1);
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let app = build_test_router(TestAppState::new(Region::Jp));
    let token = signed_up(&app, "erin@example.com", json!({})).await;

    let (status, body): (_, Option<MessageResponse>) =
        post_json(&app, "/api/v1/auth/logout", Some(&token), &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap().message, "Logged out");

    let (status, _) = get_json::<Value>(&app, "/api/v1/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_all_reports_count() {
    let app = build_test_router(TestAppState::new(Region::Jp));
    let token = signed_up(&app, "frank@example.com", json!({})).await;
    login(&app, "frank@example.com", "pw").await;
    login(&app, "frank@example.com", "pw").await;

    let (status, body): (_, Option<SuccessResponse<RevokeSessionsResponse>>) =
        post_json(&app, "/api/v1/auth/logout-all", Some(&token), &json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap().data.revoked_count, 3);
}

// ============================================================================
// Password Tests
// ============================================================================

#[tokio::test]
async fn test_forgot_password_same_answer_for_unknown_email() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    signed_up(&app, "grace@example.com", json!({})).await;

    let (known, known_body): (_, Option<MessageResponse>) = post_json(
        &app,
        "/api/v1/password/forgot",
        None,
        &json!({ "email": "grace@example.com" }),
    )
    .await;
    let (unknown, unknown_body): (_, Option<MessageResponse>) = post_json(
        &app,
        "/api/v1/password/forgot",
        None,
        &json!({ "email": "ghost@example.com" }),
    )
    .await;

    assert_eq!(known, StatusCode::OK);
    assert_eq!(unknown, StatusCode::OK);
    assert_eq!(known_body.unwrap().message, unknown_body.unwrap().message);
    assert_eq!(state.regional.outbox().await.len(), 1);
}

#[tokio::test]
async fn test_reset_password_flow() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let old_session = signed_up(&app, "heidi@example.com", json!({})).await;
    post_json::<_, Value>(
        &app,
        "/api/v1/password/forgot",
        None,
        &json!({ "email": "heidi@example.com" }),
    )
    .await;
    let token = notified(&state, NotificationKind::PasswordReset, "token").await;

    let (status, _) = post_json::<_, Value>(
        &app,
        "/api/v1/password/reset",
        None,
        &json!({ "token": token, "new_password": "fresh" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_json::<Value>(&app, "/api/v1/auth/me", Some(&old_session)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "heidi@example.com", "fresh").await;
    assert_eq!(status, StatusCode::OK);

    // Reused and expired tokens answer alike.
    let (status, _) = post_json::<_, Value>(
        &app,
        "/api/v1/password/reset",
        None,
        &json!({ "token": token, "new_password": "again" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_change_password() {
    let app = build_test_router(TestAppState::new(Region::Jp));
    let token = signed_up(&app, "ivan@example.com", json!({})).await;

    let (status, _) = post_json::<_, Value>(
        &app,
        "/api/v1/password/change",
        Some(&token),
        &json!({ "current_password": "pw", "new_password": "next" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let (status, _) = get_json::<Value>(&app, "/api/v1/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = login(&app, "ivan@example.com", "pw").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Email Change Tests
// ============================================================================

#[tokio::test]
async fn test_email_change_flow() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    let session = signed_up(&app, "judy@example.com", json!({})).await;

    let (status, _) = post_json::<_, Value>(
        &app,
        "/api/v1/email/change",
        Some(&session),
        &json!({ "new_email": "judy@new.example" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let token = notified(&state, NotificationKind::EmailChange, "token").await;

    let (status, body): (_, Option<MessageResponse>) = post_json(
        &app,
        "/api/v1/email/confirm",
        None,
        &json!({ "token": token }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap().message, "Email address updated.");

    let (status, _) = login(&app, "judy@new.example", "pw").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = login(&app, "judy@example.com", "pw").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_email_change_to_taken_address_conflicts() {
    let state = TestAppState::new(Region::Jp);
    let app = build_test_router(state.clone());
    signed_up(&app, "taken@example.com", json!({})).await;
    let session = signed_up(&app, "mallory@example.com", json!({})).await;
    post_json::<_, Value>(
        &app,
        "/api/v1/email/change",
        Some(&session),
        &json!({ "new_email": "taken@example.com" }),
    )
    .await;
    let token = notified(&state, NotificationKind::EmailChange, "token").await;

    let (status, _) = post_json::<_, Value>(
        &app,
        "/api/v1/email/confirm",
        None,
        &json!({ "token": token }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}
