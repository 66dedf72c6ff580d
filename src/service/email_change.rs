//! Email change: request a confirmation link, then apply the change across stores

use crate::config::TokenConfig;
use crate::crypto::CredentialHasher;
use crate::domain::{
    normalize_email, ConfirmEmailChangeInput, EmailChangeInput, NewNotification,
    NewShortLivedToken, NotificationKind, StringUuid, TokenKind,
};
use crate::error::{AppError, Result};
use crate::repository::{
    AccountRepository, DomainVerificationRepository, GlobalDirectory, TokenRepository,
};
use crate::service::WriteOrchestrator;
use crate::token;
use chrono::{Duration, Utc};
use std::sync::Arc;
use validator::Validate;

pub struct EmailChangeService<G, A, D, H, T>
where
    G: GlobalDirectory,
    A: AccountRepository,
    D: DomainVerificationRepository,
    H: CredentialHasher,
    T: TokenRepository,
{
    orchestrator: Arc<WriteOrchestrator<G, A, D, H>>,
    accounts: Arc<A>,
    tokens: Arc<T>,
    config: TokenConfig,
}

impl<G, A, D, H, T> EmailChangeService<G, A, D, H, T>
where
    G: GlobalDirectory,
    A: AccountRepository,
    D: DomainVerificationRepository,
    H: CredentialHasher,
    T: TokenRepository,
{
    pub fn new(
        orchestrator: Arc<WriteOrchestrator<G, A, D, H>>,
        accounts: Arc<A>,
        tokens: Arc<T>,
        config: TokenConfig,
    ) -> Self {
        Self {
            orchestrator,
            accounts,
            tokens,
            config,
        }
    }

    /// Send a confirmation link to the new address.
    pub async fn request_email_change(
        &self,
        identity_id: StringUuid,
        input: EmailChangeInput,
    ) -> Result<()> {
        input.validate()?;
        let new_email = normalize_email(&input.new_email);

        let account = self
            .accounts
            .get_by_identity_id(identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        if account.email == new_email {
            return Err(AppError::BadRequest(
                "New email matches the current one".to_string(),
            ));
        }

        self.tokens
            .delete_by_identity(identity_id, TokenKind::EmailChange)
            .await?;

        let minted = token::mint_token(self.orchestrator.region());
        self.tokens
            .create_with_notification(
                &NewShortLivedToken {
                    token_value: minted.raw,
                    kind: TokenKind::EmailChange,
                    identity_id,
                    code: None,
                    payload: Some(serde_json::json!({ "new_email": new_email })),
                    metadata: Some(serde_json::json!({ "previous_email": account.email })),
                    expires_at: Utc::now() + Duration::seconds(self.config.email_change_ttl_secs),
                },
                &NewNotification {
                    identity_id,
                    kind: NotificationKind::EmailChange,
                    recipient: new_email,
                    payload: serde_json::json!({ "token": minted.token }),
                },
            )
            .await?;

        tracing::info!(identity_id = %identity_id, "Email change requested");
        Ok(())
    }

    /// Apply a confirmed change. The token is only dropped once both stores agree.
    pub async fn confirm_email_change(&self, input: ConfirmEmailChangeInput) -> Result<()> {
        input.validate()?;
        let decoded = token::decode(&input.token)?;
        if decoded.region != self.orchestrator.region() {
            return Err(AppError::BadRequest(format!(
                "Token belongs to region {}",
                decoded.region
            )));
        }

        let pending = self
            .tokens
            .consume(decoded.raw, TokenKind::EmailChange)
            .await?;

        let new_email = pending
            .payload
            .as_ref()
            .and_then(|p| p.get("new_email"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("Email change token without target address"))
            })?;

        self.orchestrator
            .change_email(pending.identity_id, new_email)
            .await?;
        self.tokens.delete(decoded.raw).await?;

        Ok(())
    }
}
