//! DNS ownership checks for claimed domains

use crate::config::DomainVerificationConfig;
use crate::dns::{challenge_record_name, TxtResolver};
use crate::domain::{
    normalize_domain, AttemptResult, DomainChallenge, DomainVerification, StringUuid,
    VerificationOutcome, VerificationStatus,
};
use crate::error::{AppError, Result};
use crate::repository::DomainVerificationRepository;
use crate::telemetry::metrics::DOMAIN_VERIFICATIONS_TOTAL;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub struct DomainVerificationService<D: DomainVerificationRepository, R: TxtResolver> {
    repo: Arc<D>,
    resolver: Arc<R>,
    config: DomainVerificationConfig,
}

impl<D: DomainVerificationRepository, R: TxtResolver> DomainVerificationService<D, R> {
    pub fn new(repo: Arc<D>, resolver: Arc<R>, config: DomainVerificationConfig) -> Self {
        Self {
            repo,
            resolver,
            config,
        }
    }

    fn cooldown(&self) -> Duration {
        Duration::seconds(self.config.cooldown_secs)
    }

    /// Fetch a tenant's record. Another tenant's domain reads as missing.
    async fn owned(&self, tenant_id: StringUuid, domain: &str) -> Result<DomainVerification> {
        self.repo
            .find(&normalize_domain(domain))
            .await?
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| AppError::NotFound("Domain not found".to_string()))
    }

    pub fn challenge(&self, record: &DomainVerification) -> DomainChallenge {
        DomainChallenge {
            domain: record.domain.clone(),
            status: record.status,
            record_name: challenge_record_name(&self.config.record_prefix, &record.domain),
            record_value: record.verification_token.clone(),
            token_expires_at: record.token_expires_at,
        }
    }

    pub async fn get(&self, tenant_id: StringUuid, domain: &str) -> Result<DomainChallenge> {
        let record = self.owned(tenant_id, domain).await?;
        Ok(self.challenge(&record))
    }

    pub async fn list(&self, tenant_id: StringUuid) -> Result<Vec<DomainChallenge>> {
        let records = self.repo.list_by_tenant(tenant_id).await?;
        Ok(records.iter().map(|r| self.challenge(r)).collect())
    }

    pub async fn can_request_verification(
        &self,
        tenant_id: StringUuid,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let record = self.owned(tenant_id, domain).await?;
        Ok(record.can_request_verification(now, self.cooldown()))
    }

    pub async fn verify_domain(
        &self,
        tenant_id: StringUuid,
        domain: &str,
    ) -> Result<VerificationOutcome> {
        self.verify_domain_at(tenant_id, domain, Utc::now()).await
    }

    /// Run one ownership check as of `now`.
    pub async fn verify_domain_at(
        &self,
        tenant_id: StringUuid,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome> {
        let mut record = self.owned(tenant_id, domain).await?;

        if record.is_pending_expired(now) {
            return Err(AppError::Expired(
                "Verification token expired, claim the domain again".to_string(),
            ));
        }

        let cooldown = self.cooldown();
        if !record.can_request_verification(now, cooldown) {
            let retry_at = record
                .next_request_at(cooldown)
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            return Err(AppError::TooManyRequests(format!(
                "Verification already requested, retry after {}",
                retry_at
            )));
        }

        // Only one caller per cooldown window gets past this point.
        if !self
            .repo
            .reserve_attempt(&record.domain, record.last_verification_requested_at, now)
            .await?
        {
            return Err(AppError::TooManyRequests(
                "Verification already requested, retry later".to_string(),
            ));
        }

        let record_name = challenge_record_name(&self.config.record_prefix, &record.domain);
        let result = match self.resolver.lookup_txt(&record_name).await {
            Ok(values) if values.iter().any(|v| v == &record.verification_token) => {
                AttemptResult::Success
            }
            Ok(_) => AttemptResult::Failure,
            Err(e) => {
                tracing::debug!(domain = %record.domain, error = %e, "TXT lookup failed");
                AttemptResult::Failure
            }
        };

        let previous = record.status;
        record.apply_attempt(result, self.config.failure_threshold, now);
        self.repo.save_attempt(&record).await?;

        let result_label = match result {
            AttemptResult::Success => "success",
            AttemptResult::Failure => "failure",
        };
        metrics::counter!(DOMAIN_VERIFICATIONS_TOTAL, "result" => result_label).increment(1);

        if previous != record.status {
            tracing::info!(
                tenant_id = %tenant_id,
                domain = %record.domain,
                from = %previous,
                to = %record.status,
                "Domain verification status changed"
            );
        }

        Ok(VerificationOutcome {
            message: outcome_message(&record, &record_name),
            domain: record.domain.clone(),
            status: record.status,
            consecutive_failure_count: record.consecutive_failure_count,
            next_request_at: record.next_request_at(cooldown),
        })
    }
}

fn outcome_message(record: &DomainVerification, record_name: &str) -> String {
    match (record.status, record.consecutive_failure_count) {
        (VerificationStatus::Verified, 0) => "Domain ownership verified".to_string(),
        (VerificationStatus::Verified, n) => format!(
            "Challenge record not found ({} consecutive failures), domain is still verified",
            n
        ),
        (VerificationStatus::Pending, _) => format!(
            "Challenge record not found, publish the TXT record at {}",
            record_name
        ),
        (VerificationStatus::Failing, _) => format!(
            "Domain verification is failing, restore the TXT record at {}",
            record_name
        ),
    }
}
