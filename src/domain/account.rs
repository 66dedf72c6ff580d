//! Regional account models

use super::common::StringUuid;
use super::domain_verification::NewDomainVerification;
use super::identity::{IdentityStatus, RoleFlags};
use super::region::Region;
use super::session::NewSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Authoritative account row in the owning region's store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub identity_id: StringUuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub credential_hash: String,
    pub status: IdentityStatus,
    pub preferred_language: String,
    pub two_factor_enabled: bool,
    pub tenant_id: Option<StringUuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Account {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            identity_id: StringUuid::new_v4(),
            email: String::new(),
            credential_hash: String::new(),
            status: IdentityStatus::Active,
            preferred_language: "en".to_string(),
            two_factor_enabled: false,
            tenant_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for the regional half of a signup
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub identity_id: StringUuid,
    pub email: String,
    pub credential_hash: String,
    pub status: IdentityStatus,
    pub preferred_language: String,
    pub two_factor_enabled: bool,
    pub tenant_id: Option<StringUuid>,
    pub roles: Vec<String>,
}

/// Everything the regional half of a signup writes in one local transaction.
#[derive(Debug, Clone)]
pub struct AccountProvisioning {
    pub account: NewAccount,
    pub session: NewSession,
    /// Organization signups also record the claimed domain.
    pub domain_verification: Option<NewDomainVerification>,
}

/// Tenant membership, status and roles of a new identity.
///
/// Never read from a self-service request body: the signup flows pick a
/// fixed profile and only an account administrator may supply one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountProfile {
    pub tenant_id: Option<StringUuid>,
    pub status: IdentityStatus,
    pub role_flags: RoleFlags,
    pub roles: Vec<String>,
}

impl AccountProfile {
    /// Profile of an individual self-service signup.
    pub fn job_seeker() -> Self {
        Self {
            role_flags: RoleFlags::JOB_SEEKER,
            ..Default::default()
        }
    }

    /// Profile of the first administrator of a freshly created tenant.
    pub fn organization_admin(tenant_id: StringUuid) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            role_flags: RoleFlags::EMPLOYER,
            ..Default::default()
        }
    }
}

/// Self-service signup request.
///
/// Unknown fields such as `tenant_id` or `roles` are ignored.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
    /// Home region for the new identity; defaults to the receiving node's region.
    pub region: Option<Region>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub two_factor_enabled: bool,
}

/// Signup of an organization administrator together with the tenant's domain.
///
/// The tenant is created by this flow and the domain always starts pending.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrganizationSignupInput {
    #[validate(nested)]
    #[serde(flatten)]
    pub admin: SignupInput,
    #[validate(length(min = 1, max = 253))]
    pub domain: String,
}

/// Account created by an account administrator on someone's behalf.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProvisionAccountInput {
    #[validate(nested)]
    #[serde(flatten)]
    pub account: SignupInput,
    pub tenant_id: Option<StringUuid>,
    #[serde(default)]
    pub status: IdentityStatus,
    #[serde(default)]
    pub role_flags: RoleFlags,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl ProvisionAccountInput {
    pub fn into_parts(self) -> (SignupInput, AccountProfile) {
        let profile = AccountProfile {
            tenant_id: self.tenant_id,
            status: self.status,
            role_flags: self.role_flags,
            roles: self.roles,
        };
        (self.account, profile)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusInput {
    pub status: IdentityStatus,
}

/// Public account view returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    pub identity_id: StringUuid,
    pub email: String,
    pub status: IdentityStatus,
    pub preferred_language: String,
    pub two_factor_enabled: bool,
    pub tenant_id: Option<StringUuid>,
    pub home_region: Region,
}

impl AccountView {
    pub fn new(account: Account, home_region: Region) -> Self {
        Self {
            identity_id: account.identity_id,
            email: account.email,
            status: account.status,
            preferred_language: account.preferred_language,
            two_factor_enabled: account.two_factor_enabled,
            tenant_id: account.tenant_id,
            home_region,
        }
    }
}

/// Lowercase and trim an email address before hashing or storing it.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
