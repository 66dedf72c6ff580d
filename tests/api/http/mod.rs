//! HTTP handler tests over the production router
//!
//! `TestAppState` wires the real services over the in-memory stores. Peer
//! regions are wiremock servers, or a second `TestAppState` served on a local
//! listener when a test needs a real round trip.

pub mod account_http_test;
pub mod auth_http_test;
pub mod domain_http_test;

use super::{
    test_config, TestGlobalDirectory, TestHasher, TestRegionalStore, TestTxtResolver,
    TEST_EMAIL_HASH_KEY,
};
use accounts_core::config::Config;
use accounts_core::crypto::EmailHasher;
use accounts_core::domain::Region;
use accounts_core::repository::{AccountRepository, GlobalDirectory};
use accounts_core::routing::{RegionForwarder, RegionRouter};
use accounts_core::server::build_router;
use accounts_core::service::{
    DomainVerificationService, EmailChangeService, PasswordService, SessionService,
    WriteOrchestrator,
};
use accounts_core::state::HasAccounts;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

type TestOrchestrator =
    WriteOrchestrator<TestGlobalDirectory, TestRegionalStore, TestRegionalStore, TestHasher>;
type TestSessions = SessionService<TestRegionalStore, TestRegionalStore, TestRegionalStore, TestHasher>;
type TestPasswords =
    PasswordService<TestRegionalStore, TestRegionalStore, TestRegionalStore, TestHasher>;
type TestEmailChanges = EmailChangeService<
    TestGlobalDirectory,
    TestRegionalStore,
    TestRegionalStore,
    TestHasher,
    TestRegionalStore,
>;
type TestDomainChecks = DomainVerificationService<TestRegionalStore, TestTxtResolver>;

// ============================================================================
// Test App State
// ============================================================================

/// Test application state: one region's services over in-memory stores.
#[derive(Clone)]
pub struct TestAppState {
    pub config: Arc<Config>,
    pub global: Arc<TestGlobalDirectory>,
    pub regional: Arc<TestRegionalStore>,
    pub resolver: Arc<TestTxtResolver>,
    pub orchestrator: Arc<TestOrchestrator>,
    pub session_service: Arc<TestSessions>,
    pub password_service: Arc<TestPasswords>,
    pub email_change_service: Arc<TestEmailChanges>,
    pub domain_verification_service: Arc<TestDomainChecks>,
    pub region_router: Arc<RegionRouter<TestGlobalDirectory>>,
    pub forwarder: Arc<RegionForwarder>,
}

#[allow(dead_code)]
impl TestAppState {
    /// A region with no reachable peers.
    pub fn new(region: Region) -> Self {
        Self::with_global(region, Arc::new(TestGlobalDirectory::new()), HashMap::new())
    }

    /// A region forwarding to the given peer base URLs.
    pub fn with_endpoints(region: Region, endpoints: HashMap<Region, String>) -> Self {
        Self::with_global(region, Arc::new(TestGlobalDirectory::new()), endpoints)
    }

    /// A region sharing its Global Directory with other test regions.
    pub fn with_global(
        region: Region,
        global: Arc<TestGlobalDirectory>,
        endpoints: HashMap<Region, String>,
    ) -> Self {
        let config = test_config(region, endpoints);
        let regional = Arc::new(TestRegionalStore::new());
        let resolver = Arc::new(TestTxtResolver::new());
        let hasher = Arc::new(TestHasher);
        let email_hasher = EmailHasher::new(TEST_EMAIL_HASH_KEY);

        let orchestrator = Arc::new(WriteOrchestrator::new(
            global.clone(),
            regional.clone(),
            regional.clone(),
            hasher.clone(),
            email_hasher.clone(),
            region,
            config.tokens.clone(),
            config.domain_verification.clone(),
        ));
        let session_service = Arc::new(SessionService::new(
            regional.clone(),
            regional.clone(),
            regional.clone(),
            hasher.clone(),
            region,
            config.tokens.clone(),
        ));
        let password_service = Arc::new(PasswordService::new(
            regional.clone(),
            regional.clone(),
            regional.clone(),
            hasher,
            region,
            config.tokens.clone(),
        ));
        let email_change_service = Arc::new(EmailChangeService::new(
            orchestrator.clone(),
            regional.clone(),
            regional.clone(),
            config.tokens.clone(),
        ));
        let domain_verification_service = Arc::new(DomainVerificationService::new(
            regional.clone(),
            resolver.clone(),
            config.domain_verification.clone(),
        ));
        let region_router = Arc::new(RegionRouter::new(global.clone(), email_hasher, region));
        let forwarder = Arc::new(
            RegionForwarder::new(region, config.region_endpoints.clone(), &config.proxy)
                .expect("forwarder"),
        );

        Self {
            config: Arc::new(config),
            global,
            regional,
            resolver,
            orchestrator,
            session_service,
            password_service,
            email_change_service,
            domain_verification_service,
            region_router,
            forwarder,
        }
    }
}

impl HasAccounts for TestAppState {
    type Global = TestGlobalDirectory;
    type Accounts = TestRegionalStore;
    type Sessions = TestRegionalStore;
    type Tokens = TestRegionalStore;
    type Domains = TestRegionalStore;
    type Hasher = TestHasher;
    type Resolver = TestTxtResolver;

    fn config(&self) -> &Config {
        &self.config
    }

    fn orchestrator(&self) -> &TestOrchestrator {
        &self.orchestrator
    }

    fn session_service(&self) -> &TestSessions {
        &self.session_service
    }

    fn password_service(&self) -> &TestPasswords {
        &self.password_service
    }

    fn email_change_service(&self) -> &TestEmailChanges {
        &self.email_change_service
    }

    fn domain_verification_service(&self) -> &TestDomainChecks {
        &self.domain_verification_service
    }

    fn region_router(&self) -> &RegionRouter<TestGlobalDirectory> {
        &self.region_router
    }

    fn forwarder(&self) -> &RegionForwarder {
        &self.forwarder
    }

    async fn check_ready(&self) -> (bool, bool) {
        let global_ok = GlobalDirectory::ping(&*self.global).await.is_ok();
        let regional_ok = AccountRepository::ping(&*self.regional).await.is_ok();
        (global_ok, regional_ok)
    }
}

// ============================================================================
// Test Router Builder
// ============================================================================

/// The production router over `TestAppState`.
pub fn build_test_router(state: TestAppState) -> Router {
    build_router(state)
}

/// Serve a router on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============================================================================
// HTTP Test Helpers
// ============================================================================

async fn send<R: DeserializeOwned>(app: &Router, request: Request<Body>) -> (StatusCode, Option<R>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();

    if body_bytes.is_empty() {
        return (status, None);
    }

    match serde_json::from_slice(&body_bytes) {
        Ok(data) => (status, Some(data)),
        Err(_) => (status, None),
    }
}

fn request(method: Method, path: &str, bearer: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("Content-Type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(body).unwrap()
}

/// Make a GET request and parse JSON response
pub async fn get_json<R: DeserializeOwned>(
    app: &Router,
    path: &str,
    bearer: Option<&str>,
) -> (StatusCode, Option<R>) {
    send(app, request(Method::GET, path, bearer, Body::empty())).await
}

/// Make a POST request with JSON body and parse JSON response
pub async fn post_json<T: Serialize, R: DeserializeOwned>(
    app: &Router,
    path: &str,
    bearer: Option<&str>,
    body: &T,
) -> (StatusCode, Option<R>) {
    let body = Body::from(serde_json::to_string(body).unwrap());
    send(app, request(Method::POST, path, bearer, body)).await
}

/// Make a PUT request with JSON body and parse JSON response
pub async fn put_json<T: Serialize, R: DeserializeOwned>(
    app: &Router,
    path: &str,
    bearer: Option<&str>,
    body: &T,
) -> (StatusCode, Option<R>) {
    let body = Body::from(serde_json::to_string(body).unwrap());
    send(app, request(Method::PUT, path, bearer, body)).await
}

/// Make a DELETE request and parse JSON response
pub async fn delete_json<R: DeserializeOwned>(
    app: &Router,
    path: &str,
    bearer: Option<&str>,
) -> (StatusCode, Option<R>) {
    send(app, request(Method::DELETE, path, bearer, Body::empty())).await
}
