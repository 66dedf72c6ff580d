//! Password reset and change

use crate::config::TokenConfig;
use crate::crypto::CredentialHasher;
use crate::domain::{
    normalize_email, ChangePasswordInput, ForgotPasswordInput, NewNotification,
    NewShortLivedToken, NotificationKind, Region, ResetPasswordInput, StringUuid, TokenKind,
};
use crate::error::{AppError, Result};
use crate::repository::{AccountRepository, SessionRepository, TokenRepository};
use crate::token;
use chrono::{Duration, Utc};
use std::sync::Arc;
use validator::Validate;

pub struct PasswordService<A, S, T, H>
where
    A: AccountRepository,
    S: SessionRepository,
    T: TokenRepository,
    H: CredentialHasher,
{
    accounts: Arc<A>,
    sessions: Arc<S>,
    tokens: Arc<T>,
    hasher: Arc<H>,
    region: Region,
    config: TokenConfig,
}

impl<A, S, T, H> PasswordService<A, S, T, H>
where
    A: AccountRepository,
    S: SessionRepository,
    T: TokenRepository,
    H: CredentialHasher,
{
    pub fn new(
        accounts: Arc<A>,
        sessions: Arc<S>,
        tokens: Arc<T>,
        hasher: Arc<H>,
        region: Region,
        config: TokenConfig,
    ) -> Self {
        Self {
            accounts,
            sessions,
            tokens,
            hasher,
            region,
            config,
        }
    }

    /// Queue a reset link. Succeeds whether or not the account exists.
    pub async fn request_reset(&self, input: ForgotPasswordInput) -> Result<()> {
        input.validate()?;
        let email = normalize_email(&input.email);

        let Some(account) = self.accounts.get_by_email(&email, input.tenant_id).await? else {
            tracing::debug!("Password reset requested for unknown account");
            return Ok(());
        };

        // Only the newest link stays usable.
        self.tokens
            .delete_by_identity(account.identity_id, TokenKind::PasswordReset)
            .await?;

        let minted = token::mint_token(self.region);
        self.tokens
            .create_with_notification(
                &NewShortLivedToken {
                    token_value: minted.raw,
                    kind: TokenKind::PasswordReset,
                    identity_id: account.identity_id,
                    code: None,
                    payload: None,
                    metadata: None,
                    expires_at: Utc::now() + Duration::seconds(self.config.password_reset_ttl_secs),
                },
                &NewNotification {
                    identity_id: account.identity_id,
                    kind: NotificationKind::PasswordReset,
                    recipient: account.email,
                    payload: serde_json::json!({ "token": minted.token }),
                },
            )
            .await?;

        tracing::info!(identity_id = %account.identity_id, "Password reset requested");
        Ok(())
    }

    /// Set a new password with a reset token. Every session is revoked.
    pub async fn reset_password(&self, input: ResetPasswordInput) -> Result<()> {
        input.validate()?;
        let decoded = token::decode(&input.token)?;
        if decoded.region != self.region {
            return Err(AppError::BadRequest(format!(
                "Token belongs to region {}",
                decoded.region
            )));
        }

        let reset = self
            .tokens
            .consume(decoded.raw, TokenKind::PasswordReset)
            .await?;

        let account = self
            .accounts
            .get_by_identity_id(reset.identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let credential_hash = self.hasher.hash(&input.new_password).await?;
        self.accounts
            .complete_password_reset(
                account.identity_id,
                &credential_hash,
                decoded.raw,
                &password_changed(account.identity_id, account.email),
            )
            .await?;

        tracing::info!(identity_id = %account.identity_id, "Password reset completed");
        Ok(())
    }

    /// Change the password of an authenticated account.
    ///
    /// `current_session` is the raw value of the session making the request;
    /// it survives when `keep_current_session` is set.
    pub async fn change_password(
        &self,
        identity_id: StringUuid,
        current_session: &str,
        input: ChangePasswordInput,
    ) -> Result<()> {
        input.validate()?;

        let account = self
            .accounts
            .get_by_identity_id(identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        if !self
            .hasher
            .verify(&input.current_password, &account.credential_hash)
            .await?
        {
            return Err(AppError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        let credential_hash = self.hasher.hash(&input.new_password).await?;
        self.accounts
            .update_credential_hash(
                identity_id,
                &credential_hash,
                &password_changed(identity_id, account.email),
            )
            .await?;

        let revoked = if input.keep_current_session {
            self.sessions
                .delete_all_except(identity_id, current_session)
                .await?
        } else {
            self.sessions.delete_all(identity_id).await?
        };

        tracing::info!(identity_id = %identity_id, revoked, "Password changed");
        Ok(())
    }
}

fn password_changed(identity_id: StringUuid, recipient: String) -> NewNotification {
    NewNotification {
        identity_id,
        kind: NotificationKind::PasswordChanged,
        recipient,
        payload: serde_json::json!({}),
    }
}
