//! HTTP middleware for the accounts core
//!
//! - Bearer session authentication helper
//! - Request ID propagation and HTTP metrics
//! - Log-safe request spans

pub mod auth;
pub mod metrics;
pub mod trace;

pub use auth::{require_session, SessionAuth};
pub use metrics::ObservabilityLayer;
pub use trace::SanitizedMakeSpan;
