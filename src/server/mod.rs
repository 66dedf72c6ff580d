//! Server initialization and routing

use crate::api;
use crate::config::Config;
use crate::crypto::{Argon2Hasher, EmailHasher};
use crate::dns::HickoryTxtResolver;
use crate::middleware::{ObservabilityLayer, SanitizedMakeSpan};
use crate::repository::{
    account::AccountRepositoryImpl, domain_verification::DomainVerificationRepositoryImpl,
    global::GlobalDirectoryImpl, session::SessionRepositoryImpl, token::TokenRepositoryImpl,
    AccountRepository, GlobalDirectory,
};
use crate::routing::{RegionForwarder, RegionRouter};
use crate::service::{
    DomainVerificationService, EmailChangeService, PasswordService, SessionService,
    WriteOrchestrator,
};
use crate::state::HasAccounts;
use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// How often expired sessions and tokens are purged
const CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

type Orchestrator = WriteOrchestrator<
    GlobalDirectoryImpl,
    AccountRepositoryImpl,
    DomainVerificationRepositoryImpl,
    Argon2Hasher,
>;
type Sessions =
    SessionService<AccountRepositoryImpl, SessionRepositoryImpl, TokenRepositoryImpl, Argon2Hasher>;
type Passwords =
    PasswordService<AccountRepositoryImpl, SessionRepositoryImpl, TokenRepositoryImpl, Argon2Hasher>;
type EmailChanges = EmailChangeService<
    GlobalDirectoryImpl,
    AccountRepositoryImpl,
    DomainVerificationRepositoryImpl,
    Argon2Hasher,
    TokenRepositoryImpl,
>;
type DomainChecks = DomainVerificationService<DomainVerificationRepositoryImpl, HickoryTxtResolver>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub global: Arc<GlobalDirectoryImpl>,
    pub accounts: Arc<AccountRepositoryImpl>,
    pub orchestrator: Arc<Orchestrator>,
    pub session_service: Arc<Sessions>,
    pub password_service: Arc<Passwords>,
    pub email_change_service: Arc<EmailChanges>,
    pub domain_verification_service: Arc<DomainChecks>,
    pub region_router: Arc<RegionRouter<GlobalDirectoryImpl>>,
    pub forwarder: Arc<RegionForwarder>,
}

impl AppState {
    /// Wire repositories and services over the two connection pools.
    pub fn new(config: Config, global_pool: MySqlPool, regional_pool: MySqlPool) -> Result<Self> {
        let region = config.region;
        let email_hasher = EmailHasher::new(config.email_hash_key.as_bytes());

        // Create repositories
        let global = Arc::new(GlobalDirectoryImpl::new(global_pool));
        let accounts = Arc::new(AccountRepositoryImpl::new(regional_pool.clone()));
        let sessions = Arc::new(SessionRepositoryImpl::new(regional_pool.clone()));
        let tokens = Arc::new(TokenRepositoryImpl::new(regional_pool.clone()));
        let domains = Arc::new(DomainVerificationRepositoryImpl::new(regional_pool));
        let hasher = Arc::new(Argon2Hasher);

        // Create services
        let orchestrator = Arc::new(WriteOrchestrator::new(
            global.clone(),
            accounts.clone(),
            domains.clone(),
            hasher.clone(),
            email_hasher.clone(),
            region,
            config.tokens.clone(),
            config.domain_verification.clone(),
        ));
        let session_service = Arc::new(SessionService::new(
            accounts.clone(),
            sessions.clone(),
            tokens.clone(),
            hasher.clone(),
            region,
            config.tokens.clone(),
        ));
        let password_service = Arc::new(PasswordService::new(
            accounts.clone(),
            sessions,
            tokens.clone(),
            hasher,
            region,
            config.tokens.clone(),
        ));
        let email_change_service = Arc::new(EmailChangeService::new(
            orchestrator.clone(),
            accounts.clone(),
            tokens,
            config.tokens.clone(),
        ));
        let domain_verification_service = Arc::new(DomainVerificationService::new(
            domains,
            Arc::new(HickoryTxtResolver::new()),
            config.domain_verification.clone(),
        ));
        let region_router = Arc::new(RegionRouter::new(global.clone(), email_hasher, region));
        let forwarder = Arc::new(RegionForwarder::new(
            region,
            config.region_endpoints.clone(),
            &config.proxy,
        )?);

        Ok(Self {
            config: Arc::new(config),
            global,
            accounts,
            orchestrator,
            session_service,
            password_service,
            email_change_service,
            domain_verification_service,
            region_router,
            forwarder,
        })
    }
}

/// Implement HasAccounts trait for production AppState
impl HasAccounts for AppState {
    type Global = GlobalDirectoryImpl;
    type Accounts = AccountRepositoryImpl;
    type Sessions = SessionRepositoryImpl;
    type Tokens = TokenRepositoryImpl;
    type Domains = DomainVerificationRepositoryImpl;
    type Hasher = Argon2Hasher;
    type Resolver = HickoryTxtResolver;

    fn config(&self) -> &Config {
        &self.config
    }

    fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    fn session_service(&self) -> &Sessions {
        &self.session_service
    }

    fn password_service(&self) -> &Passwords {
        &self.password_service
    }

    fn email_change_service(&self) -> &EmailChanges {
        &self.email_change_service
    }

    fn domain_verification_service(&self) -> &DomainChecks {
        &self.domain_verification_service
    }

    fn region_router(&self) -> &RegionRouter<GlobalDirectoryImpl> {
        &self.region_router
    }

    fn forwarder(&self) -> &RegionForwarder {
        &self.forwarder
    }

    async fn check_ready(&self) -> (bool, bool) {
        let global_ok = self.global.ping().await.is_ok();
        let regional_ok = self.accounts.ping().await.is_ok();
        (global_ok, regional_ok)
    }
}

async fn connect(url: &str, max_connections: u32, min_connections: u32) -> Result<MySqlPool> {
    Ok(MySqlPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(min_connections)
        .connect(url)
        .await?)
}

pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    let global_pool = connect(
        &config.global_database.url,
        config.global_database.max_connections,
        config.global_database.min_connections,
    )
    .await?;
    info!("Connected to Global Directory");

    let regional_pool = connect(
        &config.regional_database.url,
        config.regional_database.max_connections,
        config.regional_database.min_connections,
    )
    .await?;
    info!(region = %config.region, "Connected to regional store");

    let http_addr = config.http_addr();
    let state = AppState::new(config, global_pool, regional_pool)?;

    spawn_cleanup(state.session_service.clone());

    let app = build_router(state).merge(metrics_router(prometheus_handle));

    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically purge expired sessions and short-lived tokens.
fn spawn_cleanup(sessions: Arc<Sessions>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = sessions.cleanup_expired().await {
                tracing::warn!(error = %e, "Expired row cleanup failed");
            }
        }
    });
}

fn metrics_router(handle: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/metrics", get(api::metrics::metrics_handler))
        .with_state(Arc::new(handle))
}

/// Build the HTTP router over any state implementation
pub fn build_router<S: HasAccounts>(state: S) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Must outlive the proxy timeout.
    let request_timeout = Duration::from_secs(state.config().proxy.timeout_secs + 5);

    Router::new()
        // Health endpoints
        .route("/health", get(api::health::health::<S>))
        .route("/ready", get(api::health::ready::<S>))
        // Signup
        .route("/api/v1/signup", post(api::account::signup::<S>))
        .route(
            "/api/v1/signup/organization",
            post(api::account::signup_organization::<S>),
        )
        // Auth & sessions
        .route("/api/v1/auth/login", post(api::auth::login::<S>))
        .route(
            "/api/v1/auth/two-factor",
            post(api::auth::verify_two_factor::<S>),
        )
        .route("/api/v1/auth/logout", post(api::auth::logout::<S>))
        .route("/api/v1/auth/logout-all", post(api::auth::logout_all::<S>))
        .route("/api/v1/auth/me", get(api::account::me::<S>))
        .route("/api/v1/auth/sessions", get(api::auth::list_sessions::<S>))
        // Password
        .route(
            "/api/v1/password/forgot",
            post(api::password::forgot_password::<S>),
        )
        .route(
            "/api/v1/password/reset",
            post(api::password::reset_password::<S>),
        )
        .route(
            "/api/v1/password/change",
            post(api::password::change_password::<S>),
        )
        // Email change
        .route(
            "/api/v1/email/change",
            post(api::email::request_email_change::<S>),
        )
        .route(
            "/api/v1/email/confirm",
            post(api::email::confirm_email_change::<S>),
        )
        // Domains
        .route(
            "/api/v1/domains",
            get(api::domain::list_domains::<S>).post(api::domain::claim_domain::<S>),
        )
        .route(
            "/api/v1/domains/{domain}",
            get(api::domain::get_domain::<S>).delete(api::domain::delete_domain::<S>),
        )
        .route(
            "/api/v1/domains/{domain}/verify",
            post(api::domain::verify_domain::<S>),
        )
        // Administration
        .route(
            "/api/v1/admin/accounts",
            post(api::account::provision_account::<S>),
        )
        .route(
            "/api/v1/admin/accounts/{identity_id}/status",
            put(api::account::set_status::<S>),
        )
        .layer(ObservabilityLayer)
        .layer(TraceLayer::new_for_http().make_span_with(SanitizedMakeSpan))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .with_state(state)
}
