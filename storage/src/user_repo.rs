//! User registry: the accounts messages are addressed between.

use chrono::Utc;
use courier_core::{User, UserDataSummary, UserId};
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{Result, StorageError};
use crate::models::UserRecord;

#[derive(Debug, Clone, Copy, Default)]
pub struct UserRepository;

impl UserRepository {
    pub async fn create(&self, conn: &mut SqliteConnection, username: &str) -> Result<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (username, created_at) VALUES (?, ?) RETURNING *",
        )
        .bind(username)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match StorageError::from(e) {
            StorageError::AlreadyExists(_) => {
                StorageError::AlreadyExists(format!("username {}", username))
            }
            other => other,
        })?;

        info!(user_id = record.id, username = %record.username, "Created user");
        Ok(record.into())
    }

    pub async fn find(&self, conn: &mut SqliteConnection, id: UserId) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(record.map(Into::into))
    }

    pub async fn find_by_username(
        &self,
        conn: &mut SqliteConnection,
        username: &str,
    ) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(record.map(Into::into))
    }

    pub async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>("SELECT * FROM users ORDER BY id ASC")
            .fetch_all(&mut *conn)
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Removes the account row and returns it, or `None` if it was already gone.
    ///
    /// Messages and notifications referencing the user are checked at commit, so the caller must
    /// clean them up within the same transaction.
    pub async fn delete(&self, conn: &mut SqliteConnection, id: UserId) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>("DELETE FROM users WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(record.map(Into::into))
    }

    /// Counts of what the user owns or is referenced by.
    pub async fn data_summary(
        &self,
        conn: &mut SqliteConnection,
        id: UserId,
    ) -> Result<UserDataSummary> {
        let (sent_messages, received_messages, notifications, message_edits): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM messages WHERE sender_id = ?1),
                    (SELECT COUNT(*) FROM messages WHERE receiver_id = ?1),
                    (SELECT COUNT(*) FROM notifications WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM message_history WHERE edited_by = ?1)
                "#,
            )
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(UserDataSummary {
            sent_messages,
            received_messages,
            notifications,
            message_edits,
        })
    }
}
