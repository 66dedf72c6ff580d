//! Session and short-lived token models (regional store only)

use super::common::{string_column, StringUuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Login session. `token_value` is the raw random part; clients only ever
/// see it wrapped in a region-prefixed token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    #[serde(skip_serializing, default)]
    pub token_value: String,
    pub identity_id: StringUuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl Default for Session {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            token_value: String::new(),
            identity_id: StringUuid::new_v4(),
            expires_at: now + chrono::Duration::hours(1),
            created_at: now,
        }
    }
}

/// Input for creating a new session
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub token_value: String,
    pub identity_id: StringUuid,
    pub expires_at: DateTime<Utc>,
}

/// Purpose of a short-lived token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    TwoFactor,
    PasswordReset,
    EmailChange,
}

impl std::str::FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "two_factor" => Ok(TokenKind::TwoFactor),
            "password_reset" => Ok(TokenKind::PasswordReset),
            "email_change" => Ok(TokenKind::EmailChange),
            _ => Err(format!("Unknown token kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::TwoFactor => write!(f, "two_factor"),
            TokenKind::PasswordReset => write!(f, "password_reset"),
            TokenKind::EmailChange => write!(f, "email_change"),
        }
    }
}

string_column!(TokenKind);

/// Two-factor, password-reset or email-change token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShortLivedToken {
    pub token_value: String,
    pub kind: TokenKind,
    pub identity_id: StringUuid,
    /// Numeric code delivered out of band (two-factor only)
    pub code: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    /// Wrong codes submitted against this token so far
    pub failed_attempts: u32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ShortLivedToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl Default for ShortLivedToken {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            token_value: String::new(),
            kind: TokenKind::TwoFactor,
            identity_id: StringUuid::new_v4(),
            code: None,
            payload: None,
            metadata: None,
            failed_attempts: 0,
            expires_at: now + chrono::Duration::minutes(10),
            created_at: now,
        }
    }
}

/// Input for creating a short-lived token
#[derive(Debug, Clone, PartialEq)]
pub struct NewShortLivedToken {
    pub token_value: String,
    pub kind: TokenKind,
    pub identity_id: StringUuid,
    pub code: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub expires_at: DateTime<Utc>,
}

/// Kind of outbound message queued in the notification outbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TwoFactorCode,
    PasswordReset,
    EmailChange,
    PasswordChanged,
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "two_factor_code" => Ok(NotificationKind::TwoFactorCode),
            "password_reset" => Ok(NotificationKind::PasswordReset),
            "email_change" => Ok(NotificationKind::EmailChange),
            "password_changed" => Ok(NotificationKind::PasswordChanged),
            _ => Err(format!("Unknown notification kind: {}", s)),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::TwoFactorCode => write!(f, "two_factor_code"),
            NotificationKind::PasswordReset => write!(f, "password_reset"),
            NotificationKind::EmailChange => write!(f, "email_change"),
            NotificationKind::PasswordChanged => write!(f, "password_changed"),
        }
    }
}

string_column!(NotificationKind);

/// Outbox row written in the same local transaction as the token it announces.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub identity_id: StringUuid,
    pub kind: NotificationKind,
    pub recipient: String,
    pub payload: serde_json::Value,
}

/// Session info returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_current: bool,
}
