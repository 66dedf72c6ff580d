//! Credential and session request models

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
    #[serde(default)]
    pub tenant_id: Option<StringUuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyTwoFactorInput {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 1, max = 16))]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForgotPasswordInput {
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub tenant_id: Option<StringUuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordInput {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 1, max = 1024))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1, max = 1024))]
    pub current_password: String,
    #[validate(length(min = 1, max = 1024))]
    pub new_password: String,
    /// Keep the session that made this request alive; every other one is dropped.
    #[serde(default = "default_true")]
    pub keep_current_session: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailChangeInput {
    #[validate(email)]
    pub new_email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfirmEmailChangeInput {
    #[validate(length(min = 1))]
    pub token: String,
}

/// Result of a password login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginOutcome {
    Authenticated {
        session_token: String,
        expires_at: DateTime<Utc>,
    },
    /// A code was queued for delivery; exchange it with the token for a session.
    TwoFactorRequired {
        two_factor_token: String,
        expires_at: DateTime<Utc>,
    },
}

/// A freshly issued session as returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuedSession {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}
