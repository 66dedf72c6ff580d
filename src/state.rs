//! Application state traits for dependency injection
//!
//! Handlers are generic over [`HasAccounts`], so the same router runs against
//! the MySQL-backed `AppState` in production and in-memory stores in tests.

use crate::config::Config;
use crate::crypto::CredentialHasher;
use crate::dns::TxtResolver;
use crate::repository::{
    AccountRepository, DomainVerificationRepository, GlobalDirectory, SessionRepository,
    TokenRepository,
};
use crate::routing::{RegionForwarder, RegionRouter};
use crate::service::{
    DomainVerificationService, EmailChangeService, PasswordService, SessionService,
    WriteOrchestrator,
};

/// Trait for application state that provides access to all services.
pub trait HasAccounts: Clone + Send + Sync + 'static {
    /// The Global Directory store
    type Global: GlobalDirectory;
    /// Regional account store
    type Accounts: AccountRepository;
    /// Regional session store
    type Sessions: SessionRepository;
    /// Regional short-lived token store
    type Tokens: TokenRepository;
    /// Regional domain verification store
    type Domains: DomainVerificationRepository;
    type Hasher: CredentialHasher;
    type Resolver: TxtResolver;

    fn config(&self) -> &Config;

    fn orchestrator(
        &self,
    ) -> &WriteOrchestrator<Self::Global, Self::Accounts, Self::Domains, Self::Hasher>;

    fn session_service(
        &self,
    ) -> &SessionService<Self::Accounts, Self::Sessions, Self::Tokens, Self::Hasher>;

    fn password_service(
        &self,
    ) -> &PasswordService<Self::Accounts, Self::Sessions, Self::Tokens, Self::Hasher>;

    fn email_change_service(
        &self,
    ) -> &EmailChangeService<Self::Global, Self::Accounts, Self::Domains, Self::Hasher, Self::Tokens>;

    fn domain_verification_service(
        &self,
    ) -> &DomainVerificationService<Self::Domains, Self::Resolver>;

    fn region_router(&self) -> &RegionRouter<Self::Global>;

    fn forwarder(&self) -> &RegionForwarder;

    /// Check if both stores answer.
    /// Returns (global_ok, regional_ok) tuple
    fn check_ready(&self) -> impl std::future::Future<Output = (bool, bool)> + Send;
}
