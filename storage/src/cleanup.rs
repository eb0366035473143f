//! Ordered deletes for account cleanup and message removal.
//!
//! The doomed message set (seed messages plus every reply below them) is materialised into a
//! connection-local temp table, then dependents are removed child-first: notifications, history,
//! messages. Counts come from the explicit deletes, so the foreign-key cascades never have
//! anything left to do.

use courier_core::{CleanupSummary, MessageId, UserId};
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{Result, StorageError};

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupRepository;

impl CleanupRepository {
    /// Removes every message `user_id` sent or received, their reply subtrees, the history and
    /// notifications of those messages, and every notification addressed to the user.
    pub async fn purge_user(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<CleanupSummary> {
        self.reset_doomed(conn).await?;

        sqlx::query(
            r#"
            WITH RECURSIVE doomed(id) AS (
                SELECT id FROM messages WHERE sender_id = ?1 OR receiver_id = ?1
                UNION
                SELECT m.id FROM messages m JOIN doomed d ON m.parent_id = d.id
            )
            INSERT INTO doomed_messages (id) SELECT id FROM doomed
            "#,
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        let notifications_deleted = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE user_id = ?1 OR message_id IN (SELECT id FROM doomed_messages)
            "#,
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        let summary = self.delete_doomed(conn, notifications_deleted).await?;

        info!(
            user_id = user_id,
            messages_deleted = summary.messages_deleted,
            notifications_deleted = summary.notifications_deleted,
            history_deleted = summary.history_deleted,
            "Purged user data"
        );
        Ok(summary)
    }

    /// Removes one message with its reply subtree and all their dependents.
    pub async fn purge_message(
        &self,
        conn: &mut SqliteConnection,
        message_id: MessageId,
    ) -> Result<CleanupSummary> {
        self.reset_doomed(conn).await?;

        let seeded = sqlx::query(
            r#"
            WITH RECURSIVE doomed(id) AS (
                SELECT id FROM messages WHERE id = ?1
                UNION
                SELECT m.id FROM messages m JOIN doomed d ON m.parent_id = d.id
            )
            INSERT INTO doomed_messages (id) SELECT id FROM doomed
            "#,
        )
        .bind(message_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if seeded == 0 {
            return Err(StorageError::NotFound(format!("message {}", message_id)));
        }

        let notifications_deleted = sqlx::query(
            "DELETE FROM notifications WHERE message_id IN (SELECT id FROM doomed_messages)",
        )
        .execute(&mut *conn)
        .await?
        .rows_affected();

        let summary = self.delete_doomed(conn, notifications_deleted).await?;

        info!(
            message_id = message_id,
            messages_deleted = summary.messages_deleted,
            "Purged message subtree"
        );
        Ok(summary)
    }

    /// Rows that still reference the user: messages on either side plus notifications.
    pub async fn remaining_references(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<i64> {
        let remaining: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COUNT(*) FROM messages WHERE sender_id = ?1 OR receiver_id = ?1)
              + (SELECT COUNT(*) FROM notifications WHERE user_id = ?1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(remaining)
    }

    async fn reset_doomed(&self, conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query("CREATE TEMP TABLE IF NOT EXISTS doomed_messages (id INTEGER PRIMARY KEY)")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM doomed_messages")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn delete_doomed(
        &self,
        conn: &mut SqliteConnection,
        notifications_deleted: u64,
    ) -> Result<CleanupSummary> {
        let history_deleted = sqlx::query(
            "DELETE FROM message_history WHERE message_id IN (SELECT id FROM doomed_messages)",
        )
        .execute(&mut *conn)
        .await?
        .rows_affected();

        // Counted up front: rows removed by the parent_id cascade during the delete are not
        // reported in its change count.
        let messages_deleted: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doomed_messages")
            .fetch_one(&mut *conn)
            .await?;
        let messages_deleted = messages_deleted as u64;

        sqlx::query("DELETE FROM messages WHERE id IN (SELECT id FROM doomed_messages)")
            .execute(&mut *conn)
            .await?;

        sqlx::query("DELETE FROM doomed_messages")
            .execute(&mut *conn)
            .await?;

        Ok(CleanupSummary {
            messages_deleted,
            notifications_deleted,
            history_deleted,
        })
    }
}
