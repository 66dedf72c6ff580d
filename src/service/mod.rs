//! Business logic layer

pub mod domain_verification;
pub mod email_change;
pub mod orchestrator;
pub mod password;
pub mod session;

pub use domain_verification::DomainVerificationService;
pub use email_change::EmailChangeService;
pub use orchestrator::{
    consistency_alert, OrganizationSignupOutcome, SignupOutcome, WriteOrchestrator,
};
pub use password::PasswordService;
pub use session::{AuthenticatedSession, SessionService};
