//! Regional account repository

use super::{conflict_on_unique, notification};
use crate::domain::{
    Account, AccountProvisioning, IdentityStatus, NewNotification, StringUuid,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::{MySqlConnection, MySqlPool};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Account, roles, first session and (for organizations) the domain
    /// verification record, in one local transaction.
    async fn create_with_session(&self, input: &AccountProvisioning) -> Result<Account>;
    async fn get_by_identity_id(&self, identity_id: StringUuid) -> Result<Option<Account>>;
    async fn get_by_email(
        &self,
        email: &str,
        tenant_id: Option<StringUuid>,
    ) -> Result<Option<Account>>;
    /// New credential hash plus a "password changed" notification.
    async fn update_credential_hash(
        &self,
        identity_id: StringUuid,
        credential_hash: &str,
        notification: &NewNotification,
    ) -> Result<()>;
    /// `Conflict` when the address is already used in the same tenant scope.
    async fn update_email(&self, identity_id: StringUuid, email: &str) -> Result<()>;
    async fn update_status(&self, identity_id: StringUuid, status: IdentityStatus) -> Result<()>;
    async fn has_role(&self, identity_id: StringUuid, role: &str) -> Result<bool>;
    async fn list_roles(&self, identity_id: StringUuid) -> Result<Vec<String>>;
    /// New credential hash, reset token consumed and every session dropped,
    /// atomically.
    async fn complete_password_reset(
        &self,
        identity_id: StringUuid,
        credential_hash: &str,
        reset_token_value: &str,
        notification: &NewNotification,
    ) -> Result<()>;
    async fn ping(&self) -> Result<()>;
}

pub struct AccountRepositoryImpl {
    pool: MySqlPool,
}

impl AccountRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str = r#"identity_id, email, credential_hash, status, preferred_language,
                   two_factor_enabled, tenant_id, created_at, updated_at"#;

async fn insert_account(conn: &mut MySqlConnection, input: &AccountProvisioning) -> Result<()> {
    let account = &input.account;
    sqlx::query(
        r#"
        INSERT INTO accounts (identity_id, email, credential_hash, status, preferred_language,
                              two_factor_enabled, tenant_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, NOW(6), NOW(6))
        "#,
    )
    .bind(account.identity_id)
    .bind(&account.email)
    .bind(&account.credential_hash)
    .bind(account.status)
    .bind(&account.preferred_language)
    .bind(account.two_factor_enabled)
    .bind(account.tenant_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| conflict_on_unique(e, "An account with this email already exists"))?;

    for role in &account.roles {
        sqlx::query("INSERT INTO account_roles (identity_id, role, created_at) VALUES (?, ?, NOW(6))")
            .bind(account.identity_id)
            .bind(role)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO sessions (token_value, identity_id, expires_at, created_at)
        VALUES (?, ?, ?, NOW(6))
        "#,
    )
    .bind(&input.session.token_value)
    .bind(input.session.identity_id)
    .bind(input.session.expires_at)
    .execute(&mut *conn)
    .await?;

    if let Some(verification) = &input.domain_verification {
        super::domain_verification::insert(&mut *conn, verification).await?;
    }

    Ok(())
}

#[async_trait]
impl AccountRepository for AccountRepositoryImpl {
    async fn create_with_session(&self, input: &AccountProvisioning) -> Result<Account> {
        let mut tx = self.pool.begin().await?;
        insert_account(&mut tx, input).await?;
        tx.commit().await?;

        self.get_by_identity_id(input.account.identity_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create account")))
    }

    async fn get_by_identity_id(&self, identity_id: StringUuid) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE identity_id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn get_by_email(
        &self,
        email: &str,
        tenant_id: Option<StringUuid>,
    ) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE email = ? AND tenant_scope = IFNULL(?, '')",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn update_credential_hash(
        &self,
        identity_id: StringUuid,
        credential_hash: &str,
        notification: &NewNotification,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE accounts
            SET credential_hash = ?, updated_at = NOW(6)
            WHERE identity_id = ?
            "#,
        )
        .bind(credential_hash)
        .bind(identity_id)
        .execute(&mut *tx)
        .await?;

        notification::enqueue(&mut tx, notification).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn update_email(&self, identity_id: StringUuid, email: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET email = ?, updated_at = NOW(6)
            WHERE identity_id = ?
            "#,
        )
        .bind(email)
        .bind(identity_id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "An account with this email already exists"))?;

        Ok(())
    }

    async fn update_status(&self, identity_id: StringUuid, status: IdentityStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
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

    async fn has_role(&self, identity_id: StringUuid, role: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM account_roles WHERE identity_id = ? AND role = ?")
                .bind(identity_id)
                .bind(role)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    async fn list_roles(&self, identity_id: StringUuid) -> Result<Vec<String>> {
        let roles: Vec<(String,)> =
            sqlx::query_as("SELECT role FROM account_roles WHERE identity_id = ? ORDER BY role")
                .bind(identity_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(roles.into_iter().map(|(role,)| role).collect())
    }

    async fn complete_password_reset(
        &self,
        identity_id: StringUuid,
        credential_hash: &str,
        reset_token_value: &str,
        notification: &NewNotification,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Deleting the token first makes a concurrent second use lose the race.
        let consumed = sqlx::query(
            "DELETE FROM short_lived_tokens WHERE token_value = ? AND identity_id = ?",
        )
        .bind(reset_token_value)
        .bind(identity_id)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            return Err(AppError::NotFound("Reset token not found".to_string()));
        }

        sqlx::query(
            r#"
            UPDATE accounts
            SET credential_hash = ?, updated_at = NOW(6)
            WHERE identity_id = ?
            "#,
        )
        .bind(credential_hash)
        .bind(identity_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM sessions WHERE identity_id = ?")
            .bind(identity_id)
            .execute(&mut *tx)
            .await?;

        notification::enqueue(&mut tx, notification).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
