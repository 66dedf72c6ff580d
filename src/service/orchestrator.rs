//! Cross-store write orchestration
//!
//! Every flow that touches both the Global Directory and this region's store
//! runs as an explicit forward/compensate pair:
//!
//! * creations write the Global Directory first, then the regional store, and
//!   undo the global writes in reverse order when the regional write fails;
//! * mutations of mirrored fields write the global field first and revert it
//!   to the prior value when the regional write fails;
//! * deletions write the regional store first and re-insert the saved row when
//!   the global release fails, since a released global name may be re-claimed
//!   by someone else before it could be restored.
//!
//! A compensation that itself fails raises a consistency alert and is never
//! retried here.

use crate::config::{DomainVerificationConfig, TokenConfig};
use crate::crypto::{self, CredentialHasher, EmailHasher};
use crate::domain::{
    normalize_domain, normalize_email, AccountProfile, AccountProvisioning, AccountView,
    DomainChallenge, IdentityStatus, NewAccount, NewDomainVerification, NewIdentity, NewSession,
    OrganizationSignupInput, Region, SignupInput, StringUuid, VerificationStatus,
};
use crate::dns::challenge_record_name;
use crate::error::{AppError, Result, CONSISTENCY_ALERT_TARGET};
use crate::repository::{AccountRepository, DomainVerificationRepository, GlobalDirectory};
use crate::telemetry::metrics::{COMPENSATIONS_TOTAL, CONSISTENCY_ALERTS_TOTAL};
use crate::token;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Result of a successful signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupOutcome {
    pub account: AccountView,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful organization signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationSignupOutcome {
    #[serde(flatten)]
    pub signup: SignupOutcome,
    pub domain: DomainChallenge,
}

pub struct WriteOrchestrator<G, A, D, H>
where
    G: GlobalDirectory,
    A: AccountRepository,
    D: DomainVerificationRepository,
    H: CredentialHasher,
{
    global: Arc<G>,
    accounts: Arc<A>,
    domains: Arc<D>,
    hasher: Arc<H>,
    email_hasher: EmailHasher,
    region: Region,
    tokens: TokenConfig,
    verification: DomainVerificationConfig,
}

impl<G, A, D, H> WriteOrchestrator<G, A, D, H>
where
    G: GlobalDirectory,
    A: AccountRepository,
    D: DomainVerificationRepository,
    H: CredentialHasher,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        global: Arc<G>,
        accounts: Arc<A>,
        domains: Arc<D>,
        hasher: Arc<H>,
        email_hasher: EmailHasher,
        region: Region,
        tokens: TokenConfig,
        verification: DomainVerificationConfig,
    ) -> Self {
        Self {
            global,
            accounts,
            domains,
            hasher,
            email_hasher,
            region,
            tokens,
            verification,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Self-service signup of an individual homed in this region.
    pub async fn signup(&self, input: SignupInput) -> Result<SignupOutcome> {
        self.provision(input, AccountProfile::job_seeker()).await
    }

    /// Create an identity homed in this region, with its first session.
    ///
    /// `profile` must come from this service or an account administrator.
    pub async fn provision(
        &self,
        input: SignupInput,
        profile: AccountProfile,
    ) -> Result<SignupOutcome> {
        input.validate()?;
        self.ensure_local(input.region)?;

        let email = normalize_email(&input.email);
        let credential_hash = self.hasher.hash(&input.password).await?;

        let identity = self
            .global
            .create_identity(&self.new_identity(&email, &profile)?)
            .await?;
        let identity_id = identity.identity_id;

        let (provisioning, session_token) =
            self.provisioning(identity_id, email, credential_hash, &input, profile, None);

        match self.accounts.create_with_session(&provisioning).await {
            Ok(account) => {
                tracing::info!(
                    identity_id = %identity_id,
                    region = %self.region,
                    "Identity created"
                );
                Ok(SignupOutcome {
                    account: AccountView::new(account, self.region),
                    session_token,
                    expires_at: provisioning.session.expires_at,
                })
            }
            Err(err) => {
                let undo = self.global.delete_identity(identity_id).await;
                Err(self.compensated("signup", &identity_id.to_string(), err, vec![undo]))
            }
        }
    }

    /// Create a new tenant: its first administrator plus a pending domain claim.
    pub async fn signup_organization(
        &self,
        input: OrganizationSignupInput,
    ) -> Result<OrganizationSignupOutcome> {
        input.validate()?;
        let admin = &input.admin;
        self.ensure_local(admin.region)?;

        let tenant_id = StringUuid::new_v4();
        let profile = AccountProfile::organization_admin(tenant_id);
        let domain = normalize_domain(&input.domain);
        if domain.is_empty() {
            return Err(AppError::BadRequest("domain is required".to_string()));
        }

        let email = normalize_email(&admin.email);
        let credential_hash = self.hasher.hash(&admin.password).await?;

        let identity = self
            .global
            .create_identity(&self.new_identity(&email, &profile)?)
            .await?;
        let identity_id = identity.identity_id;

        if let Err(err) = self
            .global
            .claim_domain(&domain, tenant_id, self.region)
            .await
        {
            let undo = self.global.delete_identity(identity_id).await;
            return Err(self.compensated(
                "signup_organization",
                &identity_id.to_string(),
                err,
                vec![undo],
            ));
        }

        let verification = self.new_verification(&domain, tenant_id);
        let (provisioning, session_token) = self.provisioning(
            identity_id,
            email,
            credential_hash,
            admin,
            profile,
            Some(verification.clone()),
        );

        match self.accounts.create_with_session(&provisioning).await {
            Ok(account) => {
                tracing::info!(
                    identity_id = %identity_id,
                    tenant_id = %tenant_id,
                    domain = %domain,
                    "Organization created"
                );
                Ok(OrganizationSignupOutcome {
                    signup: SignupOutcome {
                        account: AccountView::new(account, self.region),
                        session_token,
                        expires_at: provisioning.session.expires_at,
                    },
                    domain: self.challenge(&verification),
                })
            }
            Err(err) => {
                // Reverse order of completion: domain claim, then identity.
                let release = self.global.release_domain(&domain, tenant_id).await;
                let undo = self.global.delete_identity(identity_id).await;
                Err(self.compensated(
                    "signup_organization",
                    &identity_id.to_string(),
                    err,
                    vec![release, undo],
                ))
            }
        }
    }

    /// Claim a further domain for an existing tenant homed in this region.
    pub async fn claim_domain(&self, tenant_id: StringUuid, domain: &str) -> Result<DomainChallenge> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Err(AppError::BadRequest("domain is required".to_string()));
        }

        self.global
            .claim_domain(&domain, tenant_id, self.region)
            .await?;

        let verification = self.new_verification(&domain, tenant_id);
        match self.domains.create(&verification).await {
            Ok(_) => {
                tracing::info!(tenant_id = %tenant_id, domain = %domain, "Domain claimed");
                Ok(self.challenge(&verification))
            }
            Err(err) => {
                let release = self.global.release_domain(&domain, tenant_id).await;
                Err(self.compensated("claim_domain", &domain, err, vec![release]))
            }
        }
    }

    /// Drop a tenant's domain: regional record first, then the global claim.
    pub async fn remove_domain(&self, tenant_id: StringUuid, domain: &str) -> Result<()> {
        let domain = normalize_domain(domain);
        let record = self
            .domains
            .find(&domain)
            .await?
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| AppError::NotFound("Domain not found".to_string()))?;

        self.domains.delete(&domain).await?;

        if let Err(err) = self.global.release_domain(&domain, tenant_id).await {
            let restore = self.domains.restore(&record).await;
            return Err(self.compensated("remove_domain", &domain, err, vec![restore]));
        }

        tracing::info!(tenant_id = %tenant_id, domain = %domain, "Domain removed");
        Ok(())
    }

    /// Change the mirrored email: global hash first, then the regional address.
    pub async fn change_email(&self, identity_id: StringUuid, new_email: &str) -> Result<()> {
        let new_email = normalize_email(new_email);
        let identity = self
            .global
            .find_by_id(identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Identity not found".to_string()))?;

        let previous_hash = identity.email_hash;
        let new_hash = self.email_hasher.hash(&new_email)?;

        self.global
            .update_email_hash(identity_id, &new_hash)
            .await?;

        if let Err(err) = self.accounts.update_email(identity_id, &new_email).await {
            let revert = self
                .global
                .update_email_hash(identity_id, &previous_hash)
                .await;
            return Err(self.compensated(
                "change_email",
                &identity_id.to_string(),
                err,
                vec![revert],
            ));
        }

        tracing::info!(identity_id = %identity_id, "Email changed");
        Ok(())
    }

    /// Change the mirrored status: global first, then regional.
    pub async fn set_status(&self, identity_id: StringUuid, status: IdentityStatus) -> Result<()> {
        let identity = self
            .global
            .find_by_id(identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Identity not found".to_string()))?;

        let previous = identity.status;
        if previous == status {
            return Ok(());
        }

        self.global.update_status(identity_id, status).await?;

        if let Err(err) = self.accounts.update_status(identity_id, status).await {
            let revert = self.global.update_status(identity_id, previous).await;
            return Err(self.compensated(
                "set_status",
                &identity_id.to_string(),
                err,
                vec![revert],
            ));
        }

        tracing::info!(identity_id = %identity_id, from = %previous, to = %status, "Status changed");
        Ok(())
    }

    fn ensure_local(&self, requested: Option<Region>) -> Result<()> {
        match requested {
            Some(region) if region != self.region => Err(AppError::BadRequest(format!(
                "Region {} must be handled by its own node",
                region
            ))),
            _ => Ok(()),
        }
    }

    fn new_identity(&self, email: &str, profile: &AccountProfile) -> Result<NewIdentity> {
        Ok(NewIdentity {
            email_hash: self.email_hasher.hash(email)?,
            home_region: self.region,
            status: profile.status,
            tenant_id: profile.tenant_id,
            role_flags: profile.role_flags,
        })
    }

    fn provisioning(
        &self,
        identity_id: StringUuid,
        email: String,
        credential_hash: String,
        input: &SignupInput,
        profile: AccountProfile,
        domain_verification: Option<NewDomainVerification>,
    ) -> (AccountProvisioning, String) {
        let minted = token::mint_token(self.region);
        let provisioning = AccountProvisioning {
            account: NewAccount {
                identity_id,
                email,
                credential_hash,
                status: profile.status,
                preferred_language: input
                    .preferred_language
                    .clone()
                    .unwrap_or_else(|| "en".to_string()),
                two_factor_enabled: input.two_factor_enabled,
                tenant_id: profile.tenant_id,
                roles: profile.roles,
            },
            session: NewSession {
                token_value: minted.raw,
                identity_id,
                expires_at: Utc::now() + Duration::seconds(self.tokens.session_ttl_secs),
            },
            domain_verification,
        };
        (provisioning, minted.token)
    }

    fn new_verification(&self, domain: &str, tenant_id: StringUuid) -> NewDomainVerification {
        NewDomainVerification {
            domain: domain.to_string(),
            tenant_id,
            verification_token: crypto::random_token_value(),
            token_expires_at: Utc::now() + Duration::seconds(self.verification.token_ttl_secs),
        }
    }

    fn challenge(&self, verification: &NewDomainVerification) -> DomainChallenge {
        DomainChallenge {
            domain: verification.domain.clone(),
            status: VerificationStatus::Pending,
            record_name: challenge_record_name(
                &self.verification.record_prefix,
                &verification.domain,
            ),
            record_value: verification.verification_token.clone(),
            token_expires_at: verification.token_expires_at,
        }
    }

    /// Turn a failed second step plus its compensation results into the error
    /// the caller sees.
    fn compensated(
        &self,
        flow: &'static str,
        subject: &str,
        cause: AppError,
        compensations: Vec<Result<()>>,
    ) -> AppError {
        let failures: Vec<String> = compensations
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.to_string()))
            .collect();

        if !failures.is_empty() {
            return consistency_alert(flow, subject, &cause, &failures.join("; "));
        }

        metrics::counter!(COMPENSATIONS_TOTAL, "flow" => flow).increment(1);
        tracing::warn!(flow, subject, cause = %cause, "Cross-store write compensated");

        match cause {
            // A local uniqueness rejection means the same thing to the caller
            // whichever store raised it.
            AppError::Conflict(_) => cause,
            other => AppError::PartialFailure {
                flow,
                message: other.to_string(),
            },
        }
    }
}

/// Record a failed compensation. Orphaned data now exists in one store.
pub fn consistency_alert(
    flow: &'static str,
    subject: &str,
    cause: &AppError,
    compensation_error: &str,
) -> AppError {
    metrics::counter!(CONSISTENCY_ALERTS_TOTAL, "flow" => flow).increment(1);
    tracing::error!(
        target: CONSISTENCY_ALERT_TARGET,
        flow,
        subject,
        cause = %cause,
        compensation_error,
        "Compensation failed, manual reconciliation required"
    );
    AppError::ConsistencyAlert {
        flow,
        message: format!("{} left inconsistent for {}", flow, subject),
    }
}
