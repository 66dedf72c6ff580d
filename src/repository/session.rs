//! Session repository

use crate::domain::{NewSession, Session, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, input: &NewSession) -> Result<Session>;
    /// Returns the row even when expired; callers decide what expiry means.
    async fn find_by_token(&self, token_value: &str) -> Result<Option<Session>>;
    async fn delete(&self, token_value: &str) -> Result<()>;
    async fn delete_all(&self, identity_id: StringUuid) -> Result<u64>;
    async fn delete_all_except(&self, identity_id: StringUuid, keep_token_value: &str) -> Result<u64>;
    async fn list_by_identity(&self, identity_id: StringUuid) -> Result<Vec<Session>>;
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SessionRepositoryImpl {
    pool: MySqlPool,
}

impl SessionRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SessionRepositoryImpl {
    async fn create(&self, input: &NewSession) -> Result<Session> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_value, identity_id, expires_at, created_at)
            VALUES (?, ?, ?, NOW(6))
            "#,
        )
        .bind(&input.token_value)
        .bind(input.identity_id)
        .bind(input.expires_at)
        .execute(&self.pool)
        .await?;

        self.find_by_token(&input.token_value)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create session")))
    }

    async fn find_by_token(&self, token_value: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT token_value, identity_id, expires_at, created_at
            FROM sessions
            WHERE token_value = ?
            "#,
        )
        .bind(token_value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn delete(&self, token_value: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_value = ?")
            .bind(token_value)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Session not found".to_string()));
        }

        Ok(())
    }

    async fn delete_all(&self, identity_id: StringUuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE identity_id = ?")
            .bind(identity_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_all_except(&self, identity_id: StringUuid, keep_token_value: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE identity_id = ? AND token_value != ?
            "#,
        )
        .bind(identity_id)
        .bind(keep_token_value)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_by_identity(&self, identity_id: StringUuid) -> Result<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT token_value, identity_id, expires_at, created_at
            FROM sessions
            WHERE identity_id = ? AND expires_at > NOW(6)
            ORDER BY created_at DESC
            "#,
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW(6)")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
