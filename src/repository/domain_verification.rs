//! Domain verification repository (regional)

use crate::domain::{DomainVerification, NewDomainVerification, StringUuid, VerificationStatus};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, MySqlPool};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DomainVerificationRepository: Send + Sync {
    async fn create(&self, input: &NewDomainVerification) -> Result<DomainVerification>;
    async fn find(&self, domain: &str) -> Result<Option<DomainVerification>>;
    async fn list_by_tenant(&self, tenant_id: StringUuid) -> Result<Vec<DomainVerification>>;
    /// Claim the next check by moving `last_verification_requested_at` from
    /// `previous` to `now`. False when a concurrent check moved it first.
    async fn reserve_attempt(
        &self,
        domain: &str,
        previous: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    /// Persist the outcome of one check: status, counter and both timestamps.
    async fn save_attempt(&self, record: &DomainVerification) -> Result<()>;
    async fn delete(&self, domain: &str) -> Result<()>;
    /// Re-insert a previously deleted record verbatim.
    async fn restore(&self, record: &DomainVerification) -> Result<()>;
}

pub struct DomainVerificationRepositoryImpl {
    pool: MySqlPool,
}

impl DomainVerificationRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// New claims always start pending; only a DNS check moves them on.
pub(crate) async fn insert(conn: &mut MySqlConnection, input: &NewDomainVerification) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO domain_verifications (domain, tenant_id, verification_token, token_expires_at,
                                          status, consecutive_failure_count, last_verified_at,
                                          last_verification_requested_at, created_at)
        VALUES (?, ?, ?, ?, ?, 0, NULL, NULL, NOW(6))
        "#,
    )
    .bind(&input.domain)
    .bind(input.tenant_id)
    .bind(&input.verification_token)
    .bind(input.token_expires_at)
    .bind(VerificationStatus::Pending)
    .execute(conn)
    .await
    .map_err(|e| super::conflict_on_unique(e, "Domain verification already exists"))?;

    Ok(())
}

#[async_trait]
impl DomainVerificationRepository for DomainVerificationRepositoryImpl {
    async fn create(&self, input: &NewDomainVerification) -> Result<DomainVerification> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, input).await?;

        self.find(&input.domain)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create domain verification")))
    }

    async fn find(&self, domain: &str) -> Result<Option<DomainVerification>> {
        let record = sqlx::query_as::<_, DomainVerification>(
            r#"
            SELECT domain, tenant_id, verification_token, token_expires_at, status,
                   consecutive_failure_count, last_verified_at, last_verification_requested_at,
                   created_at
            FROM domain_verifications
            WHERE domain = ?
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_by_tenant(&self, tenant_id: StringUuid) -> Result<Vec<DomainVerification>> {
        let records = sqlx::query_as::<_, DomainVerification>(
            r#"
            SELECT domain, tenant_id, verification_token, token_expires_at, status,
                   consecutive_failure_count, last_verified_at, last_verification_requested_at,
                   created_at
            FROM domain_verifications
            WHERE tenant_id = ?
            ORDER BY domain
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn reserve_attempt(
        &self,
        domain: &str,
        previous: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        // Null-safe comparison so the very first check can be reserved too.
        let result = sqlx::query(
            r#"
            UPDATE domain_verifications
            SET last_verification_requested_at = ?
            WHERE domain = ? AND last_verification_requested_at <=> ?
            "#,
        )
        .bind(now)
        .bind(domain)
        .bind(previous)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn save_attempt(&self, record: &DomainVerification) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE domain_verifications
            SET status = ?, consecutive_failure_count = ?, last_verified_at = ?,
                last_verification_requested_at = ?
            WHERE domain = ?
            "#,
        )
        .bind(record.status)
        .bind(record.consecutive_failure_count)
        .bind(record.last_verified_at)
        .bind(record.last_verification_requested_at)
        .bind(&record.domain)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Domain verification not found".to_string()));
        }

        Ok(())
    }

    async fn delete(&self, domain: &str) -> Result<()> {
        sqlx::query("DELETE FROM domain_verifications WHERE domain = ?")
            .bind(domain)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn restore(&self, record: &DomainVerification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO domain_verifications (domain, tenant_id, verification_token, token_expires_at,
                                              status, consecutive_failure_count, last_verified_at,
                                              last_verification_requested_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.domain)
        .bind(record.tenant_id)
        .bind(&record.verification_token)
        .bind(record.token_expires_at)
        .bind(record.status)
        .bind(record.consecutive_failure_count)
        .bind(record.last_verified_at)
        .bind(record.last_verification_requested_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
