//! Login, two-factor and session lifecycle

use crate::config::TokenConfig;
use crate::crypto::{self, CredentialHasher};
use crate::domain::{
    normalize_email, Account, IdentityStatus, IssuedSession, LoginInput, LoginOutcome,
    NewNotification, NewSession, NewShortLivedToken, NotificationKind, Region, Session,
    SessionInfo, StringUuid, TokenKind, VerifyTwoFactorInput,
};
use crate::error::{AppError, Result};
use crate::repository::{AccountRepository, SessionRepository, TokenRepository};
use crate::telemetry::metrics::{EXPIRED_ROWS_DELETED_TOTAL, LOGIN_TOTAL};
use crate::token;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;
use validator::Validate;

/// Hashed once per process so unknown emails cost the same as a wrong password.
const DUMMY_PASSWORD: &str = "accounts-core-timing-equalizer";

/// A bearer session that resolved to a live account.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub session: Session,
    pub account: Account,
}

pub struct SessionService<A, S, T, H>
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
    dummy_hash: OnceCell<String>,
}

impl<A, S, T, H> SessionService<A, S, T, H>
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
            dummy_hash: OnceCell::new(),
        }
    }

    /// Password login against this region's accounts.
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome> {
        input.validate()?;
        let email = normalize_email(&input.email);

        let account = match self.accounts.get_by_email(&email, input.tenant_id).await? {
            Some(account) => account,
            None => {
                self.verify_against_dummy(&input.password).await?;
                metrics::counter!(LOGIN_TOTAL, "result" => "unknown_account").increment(1);
                return Err(invalid_credentials());
            }
        };

        if !self
            .hasher
            .verify(&input.password, &account.credential_hash)
            .await?
        {
            metrics::counter!(LOGIN_TOTAL, "result" => "bad_password").increment(1);
            return Err(invalid_credentials());
        }

        if account.status != IdentityStatus::Active {
            metrics::counter!(LOGIN_TOTAL, "result" => "inactive").increment(1);
            return Err(AppError::Forbidden("Account is not active".to_string()));
        }

        if account.two_factor_enabled {
            let minted = token::mint_token(self.region);
            let code = crypto::random_numeric_code(self.config.two_factor_code_digits);
            let expires_at = Utc::now() + Duration::seconds(self.config.two_factor_ttl_secs);

            self.tokens
                .create_with_notification(
                    &NewShortLivedToken {
                        token_value: minted.raw,
                        kind: TokenKind::TwoFactor,
                        identity_id: account.identity_id,
                        code: Some(code.clone()),
                        payload: None,
                        metadata: None,
                        expires_at,
                    },
                    &NewNotification {
                        identity_id: account.identity_id,
                        kind: NotificationKind::TwoFactorCode,
                        recipient: account.email.clone(),
                        payload: serde_json::json!({ "code": code }),
                    },
                )
                .await?;

            metrics::counter!(LOGIN_TOTAL, "result" => "two_factor_required").increment(1);
            return Ok(LoginOutcome::TwoFactorRequired {
                two_factor_token: minted.token,
                expires_at,
            });
        }

        let issued = self.issue_session(account.identity_id).await?;
        metrics::counter!(LOGIN_TOTAL, "result" => "success").increment(1);
        tracing::info!(identity_id = %account.identity_id, "Login succeeded");

        Ok(LoginOutcome::Authenticated {
            session_token: issued.session_token,
            expires_at: issued.expires_at,
        })
    }

    /// Exchange a two-factor token and code for a session.
    ///
    /// The token stays valid until it expires, so a client that lost the
    /// response can retry; every successful call creates a new session.
    pub async fn verify_two_factor(&self, input: VerifyTwoFactorInput) -> Result<IssuedSession> {
        input.validate()?;
        let raw = self.local_raw(&input.token)?;

        let pending = self.tokens.consume(raw, TokenKind::TwoFactor).await?;
        if pending.code.as_deref() != Some(input.code.trim()) {
            let revoked = self
                .tokens
                .record_failed_attempt(raw, self.config.two_factor_max_attempts)
                .await?;
            if revoked {
                tracing::warn!(
                    identity_id = %pending.identity_id,
                    "Two-factor token revoked after too many wrong codes"
                );
            }
            return Err(AppError::Unauthorized("Invalid verification code".to_string()));
        }

        let issued = self.issue_session(pending.identity_id).await?;
        tracing::info!(identity_id = %pending.identity_id, "Two-factor verification succeeded");
        Ok(issued)
    }

    /// Resolve a region-prefixed session token owned by this region.
    pub async fn authenticate(&self, session_token: &str) -> Result<AuthenticatedSession> {
        let raw = self.local_raw(session_token)?;

        let session = self
            .sessions
            .find_by_token(raw)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        if session.is_expired_at(Utc::now()) {
            return Err(AppError::Expired("Session expired".to_string()));
        }

        let account = self
            .accounts
            .get_by_identity_id(session.identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        if account.status != IdentityStatus::Active {
            return Err(AppError::Forbidden("Account is not active".to_string()));
        }

        Ok(AuthenticatedSession { session, account })
    }

    pub async fn has_role(&self, identity_id: StringUuid, role: &str) -> Result<bool> {
        self.accounts.has_role(identity_id, role).await
    }

    pub async fn logout(&self, session_token: &str) -> Result<()> {
        let raw = self.local_raw(session_token)?;
        self.sessions.delete(raw).await
    }

    pub async fn logout_all(&self, identity_id: StringUuid) -> Result<u64> {
        let count = self.sessions.delete_all(identity_id).await?;
        tracing::info!(identity_id = %identity_id, count, "All sessions revoked");
        Ok(count)
    }

    pub async fn list_sessions(
        &self,
        identity_id: StringUuid,
        current_token_value: Option<&str>,
    ) -> Result<Vec<SessionInfo>> {
        let sessions = self.sessions.list_by_identity(identity_id).await?;
        Ok(sessions
            .into_iter()
            .map(|s| SessionInfo {
                is_current: current_token_value == Some(s.token_value.as_str()),
                expires_at: s.expires_at,
                created_at: s.created_at,
            })
            .collect())
    }

    /// Remove expired sessions and short-lived tokens. Returns (sessions, tokens).
    pub async fn cleanup_expired(&self) -> Result<(u64, u64)> {
        let sessions = self.sessions.delete_expired().await?;
        let tokens = self.tokens.delete_expired().await?;

        metrics::counter!(EXPIRED_ROWS_DELETED_TOTAL, "table" => "sessions").increment(sessions);
        metrics::counter!(EXPIRED_ROWS_DELETED_TOTAL, "table" => "short_lived_tokens")
            .increment(tokens);
        tracing::debug!(sessions, tokens, "Expired rows removed");

        Ok((sessions, tokens))
    }

    async fn issue_session(&self, identity_id: StringUuid) -> Result<IssuedSession> {
        let minted = token::mint_token(self.region);
        let session = self
            .sessions
            .create(&NewSession {
                token_value: minted.raw,
                identity_id,
                expires_at: Utc::now() + Duration::seconds(self.config.session_ttl_secs),
            })
            .await?;

        Ok(IssuedSession {
            session_token: minted.token,
            expires_at: session.expires_at,
        })
    }

    /// Raw value of a token this region owns. Foreign tokens never reach the
    /// local store; the router forwards them first.
    fn local_raw<'a>(&self, token: &'a str) -> Result<&'a str> {
        let decoded = token::decode(token)?;
        if decoded.region != self.region {
            return Err(AppError::BadRequest(format!(
                "Token belongs to region {}",
                decoded.region
            )));
        }
        Ok(decoded.raw)
    }

    /// Spend one password check's worth of hashing work on a throwaway hash.
    async fn verify_against_dummy(&self, password: &str) -> Result<()> {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hasher.hash(DUMMY_PASSWORD))
            .await?;
        self.hasher.verify(password, dummy).await?;
        Ok(())
    }
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".to_string())
}
