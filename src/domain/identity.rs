//! Global Directory identity and domain-claim models
//!
//! Nothing in this module may carry plaintext email addresses or credential
//! material: these rows live in the cross-region store.

use super::common::{string_column, StringUuid};
use super::region::Region;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Identity lifecycle status, mirrored into the owning regional account row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    Invited,
    #[default]
    Active,
    Disabled,
}

impl std::str::FromStr for IdentityStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "invited" => Ok(IdentityStatus::Invited),
            "active" => Ok(IdentityStatus::Active),
            "disabled" => Ok(IdentityStatus::Disabled),
            _ => Err(format!("Unknown identity status: {}", s)),
        }
    }
}

impl std::fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityStatus::Invited => write!(f, "invited"),
            IdentityStatus::Active => write!(f, "active"),
            IdentityStatus::Disabled => write!(f, "disabled"),
        }
    }
}

string_column!(IdentityStatus);

/// Portal membership bits stored with the routing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleFlags(u32);

impl RoleFlags {
    pub const NONE: RoleFlags = RoleFlags(0);
    pub const JOB_SEEKER: RoleFlags = RoleFlags(1);
    pub const AGENCY: RoleFlags = RoleFlags(1 << 1);
    pub const EMPLOYER: RoleFlags = RoleFlags(1 << 2);
    pub const PLATFORM_ADMIN: RoleFlags = RoleFlags(1 << 3);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: RoleFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for RoleFlags {
    type Output = RoleFlags;

    fn bitor(self, rhs: RoleFlags) -> RoleFlags {
        RoleFlags(self.0 | rhs.0)
    }
}

impl From<u32> for RoleFlags {
    fn from(bits: u32) -> Self {
        RoleFlags(bits)
    }
}

/// Routing record held by the Global Directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IdentityRecord {
    pub identity_id: StringUuid,
    pub email_hash: String,
    pub home_region: Region,
    pub status: IdentityStatus,
    pub tenant_id: Option<StringUuid>,
    #[sqlx(try_from = "u32")]
    pub role_flags: RoleFlags,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for IdentityRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            identity_id: StringUuid::new_v4(),
            email_hash: String::new(),
            home_region: Region::Jp,
            status: IdentityStatus::Active,
            tenant_id: None,
            role_flags: RoleFlags::NONE,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for claiming a directory identity
#[derive(Debug, Clone, PartialEq)]
pub struct NewIdentity {
    pub email_hash: String,
    pub home_region: Region,
    pub status: IdentityStatus,
    pub tenant_id: Option<StringUuid>,
    pub role_flags: RoleFlags,
}

/// Tenant domain claim held by the Global Directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DomainClaim {
    pub domain: String,
    pub tenant_id: StringUuid,
    pub region: Region,
    pub created_at: DateTime<Utc>,
}

/// Case-fold a domain name for use as a claim key.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}
