//! Data access layer (Repository pattern)
//!
//! `global` talks to the cross-region Global Directory. Everything else talks
//! to this node's regional store and never issues a cross-region query.

pub mod account;
pub mod domain_verification;
pub mod global;
pub mod notification;
pub mod session;
pub mod token;

pub use account::AccountRepository;
pub use domain_verification::DomainVerificationRepository;
pub use global::GlobalDirectory;
pub use session::SessionRepository;
pub use token::TokenRepository;

use crate::error::{is_unique_violation, AppError};

/// Turn a unique-index rejection into `Conflict`; pass anything else through.
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(message.to_string())
    } else {
        AppError::Database(err)
    }
}
