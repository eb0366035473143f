//! Edit history repository. Rows are only ever appended; the schema rejects updates.

use chrono::{DateTime, Utc};
use courier_core::{MessageHistory, MessageId, UserId};
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::Result;
use crate::models::HistoryRecord;

#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryRepository;

impl HistoryRepository {
    pub async fn append(
        &self,
        conn: &mut SqliteConnection,
        message_id: MessageId,
        old_content: &str,
        edited_by: Option<UserId>,
        edited_at: DateTime<Utc>,
    ) -> Result<MessageHistory> {
        let record = sqlx::query_as::<_, HistoryRecord>(
            r#"
            INSERT INTO message_history (message_id, old_content, edited_at, edited_by)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(old_content)
        .bind(edited_at)
        .bind(edited_by)
        .fetch_one(&mut *conn)
        .await?;

        info!(
            history_id = record.id,
            message_id = message_id,
            edited_by = ?edited_by,
            "Recorded message edit"
        );
        Ok(record.into())
    }

    /// Snapshots of one message, oldest first. The first entry holds the original content.
    pub async fn for_message(
        &self,
        conn: &mut SqliteConnection,
        message_id: MessageId,
    ) -> Result<Vec<MessageHistory>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            "SELECT * FROM message_history WHERE message_id = ? ORDER BY edited_at ASC, id ASC",
        )
        .bind(message_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Edits made by one user across all messages, newest first.
    pub async fn by_editor(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Vec<MessageHistory>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            "SELECT * FROM message_history WHERE edited_by = ? ORDER BY edited_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    pub async fn count_for_message(
        &self,
        conn: &mut SqliteConnection,
        message_id: MessageId,
    ) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM message_history WHERE message_id = ?")
                .bind(message_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(count)
    }

    pub async fn count_all(&self, conn: &mut SqliteConnection) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message_history")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }
}
