//! Read-only view of unread messages.
//!
//! A message is unread for a user when the user is its receiver, did not send it, and it has not
//! been marked read. Listing is newest first; every call re-runs the query, so a listing can be
//! restarted at any time.

use courier_core::{Message, Page, UserId};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::MessageRecord;
use crate::sqlite_pool::SqlitePoolManager;

#[derive(Clone)]
pub struct UnreadIndex {
    pool_manager: SqlitePoolManager,
}

impl UnreadIndex {
    pub fn new(pool_manager: SqlitePoolManager) -> Self {
        Self { pool_manager }
    }

    fn pool(&self) -> &SqlitePool {
        self.pool_manager.pool()
    }

    pub async fn list(&self, user_id: UserId, page: Page) -> Result<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT * FROM messages
            WHERE receiver_id = ?1 AND sender_id <> ?1 AND is_read = 0
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(user_id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool())
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    pub async fn count(&self, user_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND sender_id <> ?1 AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }
}
