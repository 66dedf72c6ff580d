//! Request routing: decide which region owns a request

pub mod capture;
pub mod forward;

pub use capture::CapturedRequest;
pub use forward::{RegionForwarder, FORWARDED_FROM_HEADER};

use crate::crypto::EmailHasher;
use crate::domain::{normalize_domain, normalize_email, Region, StringUuid};
use crate::error::{AppError, Result};
use crate::repository::GlobalDirectory;
use crate::token;
use std::sync::Arc;

/// Where a request has to be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Local,
    Remote(Region),
}

impl RouteDecision {
    fn for_region(local: Region, owner: Region) -> Self {
        if owner == local {
            RouteDecision::Local
        } else {
            RouteDecision::Remote(owner)
        }
    }
}

pub struct RegionRouter<G: GlobalDirectory> {
    global: Arc<G>,
    email_hasher: EmailHasher,
    local: Region,
}

impl<G: GlobalDirectory> RegionRouter<G> {
    pub fn new(global: Arc<G>, email_hasher: EmailHasher, local: Region) -> Self {
        Self {
            global,
            email_hasher,
            local,
        }
    }

    pub fn local_region(&self) -> Region {
        self.local
    }

    /// Route by the region tag of a session or short-lived token.
    ///
    /// No store is consulted, so this works for any token shape the codec accepts.
    pub fn resolve_region(&self, token: &str) -> Result<RouteDecision> {
        let decoded = token::decode(token)?;
        Ok(RouteDecision::for_region(self.local, decoded.region))
    }

    /// Route a creation to the region the caller asked for, defaulting to this one.
    pub fn resolve_requested(&self, requested: Option<Region>) -> RouteDecision {
        RouteDecision::for_region(self.local, requested.unwrap_or(self.local))
    }

    pub async fn resolve_identity(&self, identity_id: StringUuid) -> Result<RouteDecision> {
        let identity = self
            .global
            .find_by_id(identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Identity not found".to_string()))?;
        Ok(RouteDecision::for_region(self.local, identity.home_region))
    }

    /// Route by the Global Directory's home region for an email hash.
    pub async fn resolve_by_email_hash(
        &self,
        email_hash: &str,
        tenant_id: Option<StringUuid>,
    ) -> Result<RouteDecision> {
        let identity = self
            .global
            .lookup_by_email_hash(email_hash, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Identity not found".to_string()))?;
        Ok(RouteDecision::for_region(self.local, identity.home_region))
    }

    pub async fn resolve_by_email(
        &self,
        email: &str,
        tenant_id: Option<StringUuid>,
    ) -> Result<RouteDecision> {
        let hash = self.email_hasher.hash(&normalize_email(email))?;
        self.resolve_by_email_hash(&hash, tenant_id).await
    }

    /// Route by the region holding a domain claim.
    pub async fn resolve_domain(&self, domain: &str) -> Result<RouteDecision> {
        let claim = self
            .global
            .find_domain_claim(&normalize_domain(domain))
            .await?
            .ok_or_else(|| AppError::NotFound("Domain not found".to_string()))?;
        Ok(RouteDecision::for_region(self.local, claim.region))
    }
}
