//! Notification outbox
//!
//! Rows are only ever written inside the caller's transaction so that a token
//! and the message announcing it commit or roll back together.

use crate::domain::NewNotification;
use crate::error::Result;
use sqlx::MySqlConnection;

pub(crate) async fn enqueue(conn: &mut MySqlConnection, notification: &NewNotification) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notification_outbox (identity_id, kind, recipient, payload, created_at)
        VALUES (?, ?, ?, ?, NOW(6))
        "#,
    )
    .bind(notification.identity_id)
    .bind(notification.kind)
    .bind(&notification.recipient)
    .bind(&notification.payload)
    .execute(conn)
    .await?;

    Ok(())
}
