//! Message repository: persistence and queries for messages.
//!
//! Every method takes the connection to run on, so callers decide whether a call joins an open
//! transaction or runs on its own pooled connection.

use chrono::{DateTime, Utc};
use courier_core::{Message, MessageId, UserId};
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{Result, StorageError};
use crate::models::{MessageDirection, MessageQuery, MessageRecord, NewMessage};

#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRepository;

impl MessageRepository {
    /// Inserts a new message with `read = false`, `edited = false`. Reference checks are the
    /// caller's job; a dangling parent still fails on the foreign key.
    pub async fn insert(&self, conn: &mut SqliteConnection, new: &NewMessage) -> Result<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (sender_id, receiver_id, parent_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new.sender_id)
        .bind(new.receiver_id)
        .bind(new.parent_id)
        .bind(&new.content)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        info!(
            message_id = record.id,
            sender_id = record.sender_id,
            receiver_id = record.receiver_id,
            parent_id = ?record.parent_id,
            "Saved message"
        );
        Ok(record.into())
    }

    pub async fn find(&self, conn: &mut SqliteConnection, id: MessageId) -> Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(record.map(Into::into))
    }

    pub async fn get(&self, conn: &mut SqliteConnection, id: MessageId) -> Result<Message> {
        self.find(conn, id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("message {}", id)))
    }

    /// Claims the row for an update: bumps its version and returns it as currently stored.
    ///
    /// Run inside a write transaction; the returned content is what the pending write replaces.
    pub async fn lock_for_update(
        &self,
        conn: &mut SqliteConnection,
        id: MessageId,
    ) -> Result<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "UPDATE messages SET version = version + 1 WHERE id = ? RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("message {}", id)))?;
        Ok(record.into())
    }

    /// Writes new content. `content_changed` sets the edited flag and timestamp; it must agree
    /// with whether a history snapshot was taken in the same transaction.
    pub async fn write_content(
        &self,
        conn: &mut SqliteConnection,
        id: MessageId,
        content: &str,
        content_changed: bool,
        edited_at: DateTime<Utc>,
    ) -> Result<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            UPDATE messages
            SET content = ?1,
                edited = CASE WHEN ?2 THEN 1 ELSE edited END,
                edited_at = CASE WHEN ?2 THEN ?3 ELSE edited_at END
            WHERE id = ?4
            RETURNING *
            "#,
        )
        .bind(content)
        .bind(content_changed)
        .bind(edited_at)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("message {}", id)))?;
        Ok(record.into())
    }

    /// Points a message at a new parent (`None` detaches it into its own thread root).
    pub async fn set_parent(
        &self,
        conn: &mut SqliteConnection,
        id: MessageId,
        parent_id: Option<MessageId>,
    ) -> Result<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "UPDATE messages SET parent_id = ?, version = version + 1 WHERE id = ? RETURNING *",
        )
        .bind(parent_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("message {}", id)))?;
        Ok(record.into())
    }

    /// Sets `read = true` if it is not already. Returns whether a row changed.
    pub async fn mark_read(&self, conn: &mut SqliteConnection, id: MessageId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1, version = version + 1 WHERE id = ? AND is_read = 0",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Marks every unread message addressed to `user_id` as read, except ones the user sent.
    pub async fn mark_all_read(&self, conn: &mut SqliteConnection, user_id: UserId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = 1, version = version + 1
            WHERE receiver_id = ?1 AND sender_id <> ?1 AND is_read = 0
            "#,
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        info!(
            user_id = user_id,
            updated = result.rows_affected(),
            "Marked all messages read"
        );
        Ok(result.rows_affected())
    }

    /// Messages the user sent and/or received, newest first.
    pub async fn list_for_user(
        &self,
        conn: &mut SqliteConnection,
        query: &MessageQuery,
    ) -> Result<Vec<Message>> {
        let mut sql = String::from("SELECT * FROM messages WHERE ");
        sql.push_str(match query.direction {
            MessageDirection::Sent => "sender_id = ?1",
            MessageDirection::Received => "receiver_id = ?1",
            MessageDirection::Both => "(sender_id = ?1 OR receiver_id = ?1)",
        });
        if query.roots_only {
            sql.push_str(" AND parent_id IS NULL");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3");

        let records = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(query.user_id)
            .bind(query.page.sql_limit())
            .bind(query.page.sql_offset())
            .fetch_all(&mut *conn)
            .await?;

        info!(
            user_id = query.user_id,
            "Retrieved {} messages",
            records.len()
        );
        Ok(records.into_iter().map(Into::into).collect())
    }

    pub async fn count_all(&self, conn: &mut SqliteConnection) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }
}
