//! Domain ownership verification state machine
//!
//! A domain moves between three states:
//!
//! ```text
//! pending --success--> verified --N failures--> failing --success--> verified
//! ```
//!
//! A pending domain that keeps failing stays pending with a growing counter.
//! `failing` only ever means "was verified, has since stopped resolving".
//! Expiry of a pending claim is an external TTL (`token_expires_at`), not a state.

use super::common::{string_column, StringUuid};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
    Failing,
}

impl std::str::FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "failing" => Ok(VerificationStatus::Failing),
            _ => Err(format!("Unknown verification status: {}", s)),
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Pending => write!(f, "pending"),
            VerificationStatus::Verified => write!(f, "verified"),
            VerificationStatus::Failing => write!(f, "failing"),
        }
    }
}

string_column!(VerificationStatus);

/// Outcome of one DNS check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    Success,
    Failure,
}

/// The part of a verification record the transition function reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationState {
    pub status: VerificationStatus,
    pub consecutive_failure_count: u32,
}

impl VerificationState {
    pub fn pending() -> Self {
        Self {
            status: VerificationStatus::Pending,
            consecutive_failure_count: 0,
        }
    }

    /// Apply one attempt. `failure_threshold` is the number of consecutive
    /// failures after which a verified domain is reported as failing.
    pub fn transition(self, result: AttemptResult, failure_threshold: u32) -> Self {
        match result {
            AttemptResult::Success => Self {
                status: VerificationStatus::Verified,
                consecutive_failure_count: 0,
            },
            AttemptResult::Failure => {
                let count = self.consecutive_failure_count.saturating_add(1);
                let status = match self.status {
                    VerificationStatus::Verified if count >= failure_threshold => {
                        VerificationStatus::Failing
                    }
                    other => other,
                };
                Self {
                    status,
                    consecutive_failure_count: count,
                }
            }
        }
    }
}

/// Regional verification record for a claimed domain.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DomainVerification {
    pub domain: String,
    pub tenant_id: StringUuid,
    #[serde(skip_serializing, default)]
    pub verification_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub status: VerificationStatus,
    pub consecutive_failure_count: u32,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub last_verification_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Default for DomainVerification {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            domain: String::new(),
            tenant_id: StringUuid::new_v4(),
            verification_token: String::new(),
            token_expires_at: now + Duration::days(7),
            status: VerificationStatus::Pending,
            consecutive_failure_count: 0,
            last_verified_at: None,
            last_verification_requested_at: None,
            created_at: now,
        }
    }
}

impl DomainVerification {
    pub fn state(&self) -> VerificationState {
        VerificationState {
            status: self.status,
            consecutive_failure_count: self.consecutive_failure_count,
        }
    }

    /// Record an attempt made at `now`.
    pub fn apply_attempt(&mut self, result: AttemptResult, failure_threshold: u32, now: DateTime<Utc>) {
        let next = self.state().transition(result, failure_threshold);
        self.status = next.status;
        self.consecutive_failure_count = next.consecutive_failure_count;
        self.last_verification_requested_at = Some(now);
        if result == AttemptResult::Success {
            self.last_verified_at = Some(now);
        }
    }

    /// Earliest instant at which another check may be requested.
    pub fn next_request_at(&self, cooldown: Duration) -> Option<DateTime<Utc>> {
        let anchor = match (self.last_verification_requested_at, self.last_verified_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        anchor.map(|at| at + cooldown)
    }

    pub fn can_request_verification(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.next_request_at(cooldown) {
            Some(boundary) => now >= boundary,
            None => true,
        }
    }

    /// A pending claim whose challenge token lapsed can no longer be verified.
    pub fn is_pending_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == VerificationStatus::Pending && self.token_expires_at <= now
    }
}

/// Input for creating a verification record
#[derive(Debug, Clone, PartialEq)]
pub struct NewDomainVerification {
    pub domain: String,
    pub tenant_id: StringUuid,
    pub verification_token: String,
    pub token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClaimDomainInput {
    #[validate(length(min = 1, max = 253))]
    pub domain: String,
}

/// Result of `verify_domain`, as handed to the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationOutcome {
    pub domain: String,
    pub status: VerificationStatus,
    pub consecutive_failure_count: u32,
    pub message: String,
    pub next_request_at: Option<DateTime<Utc>>,
}

/// Instructions returned to the tenant after claiming a domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainChallenge {
    pub domain: String,
    pub status: VerificationStatus,
    pub record_name: String,
    pub record_value: String,
    pub token_expires_at: DateTime<Utc>,
}
