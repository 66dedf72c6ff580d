//! Accounts Core - cross-region identity service backend
//!
//! Each node serves one region. A small Global Directory maps identities and
//! domain claims to their home region; everything else lives in the region's
//! own store, and requests for another region are forwarded there.

pub mod api;
pub mod config;
pub mod crypto;
pub mod dns;
pub mod domain;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod repository;
pub mod routing;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;
pub mod token;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
