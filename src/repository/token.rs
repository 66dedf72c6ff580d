//! Short-lived token repository (two-factor, password reset, email change)

use super::notification;
use crate::domain::{NewNotification, NewShortLivedToken, ShortLivedToken, StringUuid, TokenKind};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Token and the notification announcing it, in one local transaction.
    async fn create_with_notification(
        &self,
        token: &NewShortLivedToken,
        notification: &NewNotification,
    ) -> Result<ShortLivedToken>;
    /// Read a live token of the given kind without deleting it.
    ///
    /// `NotFound` when absent or of another kind, `Expired` when past its TTL.
    async fn consume(&self, token_value: &str, kind: TokenKind) -> Result<ShortLivedToken>;
    async fn delete(&self, token_value: &str) -> Result<()>;
    /// Count one wrong code against a token, deleting it once `max_attempts`
    /// is reached. Returns true when the token is gone.
    async fn record_failed_attempt(&self, token_value: &str, max_attempts: u32) -> Result<bool>;
    /// Invalidate every outstanding token of one kind for an identity.
    async fn delete_by_identity(&self, identity_id: StringUuid, kind: TokenKind) -> Result<u64>;
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct TokenRepositoryImpl {
    pool: MySqlPool,
}

impl TokenRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn find(&self, token_value: &str) -> Result<Option<ShortLivedToken>> {
        let token = sqlx::query_as::<_, ShortLivedToken>(
            r#"
            SELECT token_value, kind, identity_id, code, payload, metadata, failed_attempts,
                   expires_at, created_at
            FROM short_lived_tokens
            WHERE token_value = ?
            "#,
        )
        .bind(token_value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }
}

#[async_trait]
impl TokenRepository for TokenRepositoryImpl {
    async fn create_with_notification(
        &self,
        token: &NewShortLivedToken,
        notification: &NewNotification,
    ) -> Result<ShortLivedToken> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO short_lived_tokens (token_value, kind, identity_id, code, payload,
                                            metadata, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NOW(6))
            "#,
        )
        .bind(&token.token_value)
        .bind(token.kind)
        .bind(token.identity_id)
        .bind(&token.code)
        .bind(&token.payload)
        .bind(&token.metadata)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await?;

        notification::enqueue(&mut tx, notification).await?;
        tx.commit().await?;

        self.find(&token.token_value)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create token")))
    }

    async fn consume(&self, token_value: &str, kind: TokenKind) -> Result<ShortLivedToken> {
        let token = self
            .find(token_value)
            .await?
            .filter(|t| t.kind == kind)
            .ok_or_else(|| AppError::NotFound("Token not found".to_string()))?;

        if token.is_expired_at(Utc::now()) {
            return Err(AppError::Expired("Token expired".to_string()));
        }

        Ok(token)
    }

    async fn delete(&self, token_value: &str) -> Result<()> {
        sqlx::query("DELETE FROM short_lived_tokens WHERE token_value = ?")
            .bind(token_value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_failed_attempt(&self, token_value: &str, max_attempts: u32) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken here serializes concurrent guesses.
        let updated = sqlx::query(
            "UPDATE short_lived_tokens SET failed_attempts = failed_attempts + 1 WHERE token_value = ?",
        )
        .bind(token_value)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(true);
        }

        let attempts: u32 = sqlx::query_scalar(
            "SELECT failed_attempts FROM short_lived_tokens WHERE token_value = ?",
        )
        .bind(token_value)
        .fetch_one(&mut *tx)
        .await?;

        let revoked = attempts >= max_attempts;
        if revoked {
            sqlx::query("DELETE FROM short_lived_tokens WHERE token_value = ?")
                .bind(token_value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(revoked)
    }

    async fn delete_by_identity(&self, identity_id: StringUuid, kind: TokenKind) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM short_lived_tokens WHERE identity_id = ? AND kind = ?")
                .bind(identity_id)
                .bind(kind)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM short_lived_tokens WHERE expires_at <= NOW(6)")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
