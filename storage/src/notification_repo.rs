//! Notification repository.
//!
//! `notifications.message_id` is unique: inserting twice for the same message is a no-op that
//! returns the row stored the first time, which makes redelivery safe.

use chrono::Utc;
use courier_core::{MessageId, Notification, Page, UserId};
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{Result, StorageError};
use crate::models::NotificationRecord;

#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationRepository;

impl NotificationRepository {
    /// Creates the notification for `message_id` unless one exists. Returns the stored row and
    /// whether this call created it.
    pub async fn insert_once(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
        message_id: MessageId,
    ) -> Result<(Notification, bool)> {
        let created = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, message_id, is_read, created_at)
            VALUES (?, ?, 0, ?)
            ON CONFLICT(message_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(message_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .rows_affected()
            > 0;

        let notification = self
            .find_by_message(conn, message_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("notification for message {}", message_id)))?;

        if created {
            info!(
                notification_id = notification.id,
                user_id = user_id,
                message_id = message_id,
                "Created notification"
            );
        }
        Ok((notification, created))
    }

    pub async fn find_by_message(
        &self,
        conn: &mut SqliteConnection,
        message_id: MessageId,
    ) -> Result<Option<Notification>> {
        let record = sqlx::query_as::<_, NotificationRecord>(
            "SELECT * FROM notifications WHERE message_id = ?",
        )
        .bind(message_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(record.map(Into::into))
    }

    /// Notifications addressed to the user, newest first.
    pub async fn list_for_user(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Notification>> {
        let records = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(user_id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(&mut *conn)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Idempotent: returns the notification whether or not it was already read.
    pub async fn mark_read(&self, conn: &mut SqliteConnection, id: i64) -> Result<Notification> {
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND is_read = 0")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        let record =
            sqlx::query_as::<_, NotificationRecord>("SELECT * FROM notifications WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| StorageError::NotFound(format!("notification {}", id)))?;
        Ok(record.into())
    }

    pub async fn count_for_message(
        &self,
        conn: &mut SqliteConnection,
        message_id: MessageId,
    ) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE message_id = ?")
                .bind(message_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(count)
    }

    pub async fn count_all(&self, conn: &mut SqliteConnection) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }
}
