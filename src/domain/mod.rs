//! Domain models for the accounts core

pub mod account;
pub mod auth;
pub mod common;
pub mod domain_verification;
pub mod identity;
pub mod region;
pub mod session;

pub use account::*;
pub use auth::*;
pub use common::StringUuid;
pub use domain_verification::*;
pub use identity::*;
pub use region::*;
pub use session::*;
