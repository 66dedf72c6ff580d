//! Global Directory repository
//!
//! The only cross-region store. Holds identity routing records and tenant
//! domain claims; uniqueness is enforced by unique indexes and detected from
//! the rejected write, never from a prior read.

use super::conflict_on_unique;
use crate::domain::{
    DomainClaim, IdentityRecord, IdentityStatus, NewIdentity, Region, StringUuid,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GlobalDirectory: Send + Sync {
    /// Insert a new identity. `Conflict` when `(email_hash, tenant scope)` is taken.
    async fn create_identity(&self, input: &NewIdentity) -> Result<IdentityRecord>;
    async fn lookup_by_email_hash(
        &self,
        email_hash: &str,
        tenant_id: Option<StringUuid>,
    ) -> Result<Option<IdentityRecord>>;
    async fn find_by_id(&self, identity_id: StringUuid) -> Result<Option<IdentityRecord>>;
    async fn update_status(&self, identity_id: StringUuid, status: IdentityStatus) -> Result<()>;
    /// `Conflict` when the new hash is already taken in the same tenant scope.
    async fn update_email_hash(&self, identity_id: StringUuid, email_hash: &str) -> Result<()>;
    /// Idempotent: deleting an absent identity succeeds.
    async fn delete_identity(&self, identity_id: StringUuid) -> Result<()>;
    /// First claim wins. `Conflict` when any tenant already holds the domain.
    async fn claim_domain(
        &self,
        domain: &str,
        tenant_id: StringUuid,
        region: Region,
    ) -> Result<DomainClaim>;
    async fn find_domain_claim(&self, domain: &str) -> Result<Option<DomainClaim>>;
    /// Release a claim held by `tenant_id`. Idempotent.
    async fn release_domain(&self, domain: &str, tenant_id: StringUuid) -> Result<()>;
    /// Cheap round trip for readiness checks.
    async fn ping(&self) -> Result<()>;
}

pub struct GlobalDirectoryImpl {
    pool: MySqlPool,
}

impl GlobalDirectoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GlobalDirectory for GlobalDirectoryImpl {
    async fn create_identity(&self, input: &NewIdentity) -> Result<IdentityRecord> {
        let identity_id = StringUuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO identities (identity_id, email_hash, home_region, status, tenant_id,
                                    role_flags, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, NOW(6), NOW(6))
            "#,
        )
        .bind(identity_id)
        .bind(&input.email_hash)
        .bind(input.home_region)
        .bind(input.status)
        .bind(input.tenant_id)
        .bind(input.role_flags.bits())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "An identity with this email already exists"))?;

        self.find_by_id(identity_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create identity")))
    }

    async fn lookup_by_email_hash(
        &self,
        email_hash: &str,
        tenant_id: Option<StringUuid>,
    ) -> Result<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT identity_id, email_hash, home_region, status, tenant_id, role_flags,
                   created_at, updated_at
            FROM identities
            WHERE email_hash = ? AND tenant_scope = IFNULL(?, '')
            "#,
        )
        .bind(email_hash)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_id(&self, identity_id: StringUuid) -> Result<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT identity_id, email_hash, home_region, status, tenant_id, role_flags,
                   created_at, updated_at
            FROM identities
            WHERE identity_id = ?
            "#,
        )
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_status(&self, identity_id: StringUuid, status: IdentityStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE identities
            SET status = ?, updated_at = NOW(6)
            WHERE identity_id = ?
            "#,
        )
        .bind(status)
        .bind(identity_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_email_hash(&self, identity_id: StringUuid, email_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE identities
            SET email_hash = ?, updated_at = NOW(6)
            WHERE identity_id = ?
            "#,
        )
        .bind(email_hash)
        .bind(identity_id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "An identity with this email already exists"))?;

        Ok(())
    }

    async fn delete_identity(&self, identity_id: StringUuid) -> Result<()> {
        sqlx::query("DELETE FROM identities WHERE identity_id = ?")
            .bind(identity_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn claim_domain(
        &self,
        domain: &str,
        tenant_id: StringUuid,
        region: Region,
    ) -> Result<DomainClaim> {
        sqlx::query(
            r#"
            INSERT INTO domain_claims (domain, tenant_id, region, created_at)
            VALUES (?, ?, ?, NOW(6))
            "#,
        )
        .bind(domain)
        .bind(tenant_id)
        .bind(region)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Domain is already claimed"))?;

        self.find_domain_claim(domain)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to claim domain")))
    }

    async fn find_domain_claim(&self, domain: &str) -> Result<Option<DomainClaim>> {
        let claim = sqlx::query_as::<_, DomainClaim>(
            r#"
            SELECT domain, tenant_id, region, created_at
            FROM domain_claims
            WHERE domain = ?
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(claim)
    }

    async fn release_domain(&self, domain: &str, tenant_id: StringUuid) -> Result<()> {
        sqlx::query("DELETE FROM domain_claims WHERE domain = ? AND tenant_id = ?")
            .bind(domain)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
