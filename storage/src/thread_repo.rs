//! Thread queries over the self-referencing `messages.parent_id` column.
//!
//! Each query is a single `WITH RECURSIVE` statement evaluated by SQLite, bounded by `max_depth`,
//! so neither a very deep thread nor a corrupted (cyclic) chain can recurse without limit.

use std::collections::BTreeSet;

use courier_core::{Message, MessageId, UserId};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::error::{Result, StorageError};
use crate::models::ThreadRow;

pub const DEFAULT_MAX_DEPTH: u32 = 256;

#[derive(Debug, Clone, Copy)]
pub struct ThreadRepository {
    max_depth: u32,
}

impl Default for ThreadRepository {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl ThreadRepository {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Number of ancestors of `id` (0 for a thread root).
    pub async fn depth_of(&self, conn: &mut SqliteConnection, id: MessageId) -> Result<u32> {
        let (top_id, top_parent, depth) = self.walk_up(conn, id).await?;
        if top_parent.is_some() {
            warn!(message_id = id, top_id, "Ancestor walk hit depth bound");
            return Err(StorageError::InvalidReference(format!(
                "message {} is nested deeper than {} levels",
                id, self.max_depth
            )));
        }
        Ok(depth)
    }

    /// Follows parent links upward until a message without a parent is found.
    pub async fn root_of(&self, conn: &mut SqliteConnection, id: MessageId) -> Result<Message> {
        let (top_id, top_parent, _) = self.walk_up(conn, id).await?;
        if top_parent.is_some() {
            return Err(StorageError::InvalidReference(format!(
                "no thread root within {} levels above message {}",
                self.max_depth, id
            )));
        }

        let record = sqlx::query_as::<_, crate::models::MessageRecord>(
            "SELECT * FROM messages WHERE id = ?",
        )
        .bind(top_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(record.into())
    }

    /// Topmost message reachable within the depth bound: `(id, its parent_id, levels climbed)`.
    async fn walk_up(
        &self,
        conn: &mut SqliteConnection,
        id: MessageId,
    ) -> Result<(MessageId, Option<MessageId>, u32)> {
        let top: Option<(i64, Option<i64>, i64)> = sqlx::query_as(
            r#"
            WITH RECURSIVE ancestors(id, parent_id, depth) AS (
                SELECT id, parent_id, 0 FROM messages WHERE id = ?1
                UNION ALL
                SELECT m.id, m.parent_id, a.depth + 1
                FROM messages m
                JOIN ancestors a ON m.id = a.parent_id
                WHERE a.depth < ?2
            )
            SELECT id, parent_id, depth FROM ancestors ORDER BY depth DESC LIMIT 1
            "#,
        )
        .bind(id)
        .bind(self.max_depth as i64)
        .fetch_optional(&mut *conn)
        .await?;

        let (top_id, top_parent, depth) =
            top.ok_or_else(|| StorageError::NotFound(format!("message {}", id)))?;
        Ok((top_id, top_parent, depth as u32))
    }

    /// `root` plus every descendant, ordered by depth, then creation time, then id.
    ///
    /// The walk goes one level past `max_depth`; a row there means the thread is deeper than the
    /// bound and is reported as `InvalidReference` rather than returned cut short.
    pub async fn subtree(
        &self,
        conn: &mut SqliteConnection,
        root: MessageId,
    ) -> Result<Vec<(Message, u32)>> {
        let rows = sqlx::query_as::<_, ThreadRow>(
            r#"
            WITH RECURSIVE thread(id, depth) AS (
                SELECT id, 0 FROM messages WHERE id = ?1
                UNION ALL
                SELECT m.id, t.depth + 1
                FROM messages m
                JOIN thread t ON m.parent_id = t.id
                WHERE t.depth <= ?2
            )
            SELECT m.*, t.depth AS depth
            FROM thread t
            JOIN messages m ON m.id = t.id
            ORDER BY t.depth ASC, m.created_at ASC, m.id ASC
            "#,
        )
        .bind(root)
        .bind(self.max_depth as i64)
        .fetch_all(&mut *conn)
        .await?;

        if rows.is_empty() {
            return Err(StorageError::NotFound(format!("message {}", root)));
        }
        if let Some(row) = rows.iter().find(|row| row.depth > self.max_depth as i64) {
            warn!(root_id = root, message_id = row.message.id, "Thread walk hit depth bound");
            return Err(StorageError::InvalidReference(format!(
                "thread below message {} is nested deeper than {} levels",
                root, self.max_depth
            )));
        }

        debug!(root_id = root, size = rows.len(), "Loaded thread");
        Ok(rows
            .into_iter()
            .map(|row| (row.message.into(), row.depth as u32))
            .collect())
    }

    /// Every direct and indirect reply to `id`, in thread order.
    pub async fn all_replies(
        &self,
        conn: &mut SqliteConnection,
        id: MessageId,
    ) -> Result<Vec<Message>> {
        let rows = self.subtree(conn, id).await?;
        Ok(rows.into_iter().skip(1).map(|(m, _)| m).collect())
    }

    /// Whether `candidate` is `ancestor` itself or lies below it.
    pub async fn is_in_subtree(
        &self,
        conn: &mut SqliteConnection,
        ancestor: MessageId,
        candidate: MessageId,
    ) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            WITH RECURSIVE thread(id, depth) AS (
                SELECT id, 0 FROM messages WHERE id = ?1
                UNION ALL
                SELECT m.id, t.depth + 1
                FROM messages m
                JOIN thread t ON m.parent_id = t.id
                WHERE t.depth < ?3
            )
            SELECT id FROM thread WHERE id = ?2 LIMIT 1
            "#,
        )
        .bind(ancestor)
        .bind(candidate)
        .bind(self.max_depth as i64)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(found.is_some())
    }

    /// Levels below `id` in its deepest branch (0 for a leaf).
    pub async fn height_of(&self, conn: &mut SqliteConnection, id: MessageId) -> Result<u32> {
        let height: Option<i64> = sqlx::query_scalar(
            r#"
            WITH RECURSIVE thread(id, depth) AS (
                SELECT id, 0 FROM messages WHERE id = ?1
                UNION ALL
                SELECT m.id, t.depth + 1
                FROM messages m
                JOIN thread t ON m.parent_id = t.id
                WHERE t.depth < ?2
            )
            SELECT MAX(depth) FROM thread
            "#,
        )
        .bind(id)
        .bind(self.max_depth as i64)
        .fetch_one(&mut *conn)
        .await?;

        height
            .map(|h| h as u32)
            .ok_or_else(|| StorageError::NotFound(format!("message {}", id)))
    }

    /// Direct replies only.
    pub async fn reply_count(&self, conn: &mut SqliteConnection, id: MessageId) -> Result<i64> {
        let (exists, count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM messages WHERE id = ?1),
                (SELECT COUNT(*) FROM messages WHERE parent_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

        if exists == 0 {
            return Err(StorageError::NotFound(format!("message {}", id)));
        }
        Ok(count)
    }

    /// Senders and receivers across the thread rooted at `root`, ascending.
    pub async fn participants(
        &self,
        conn: &mut SqliteConnection,
        root: MessageId,
    ) -> Result<BTreeSet<UserId>> {
        let rows = self.subtree(conn, root).await?;
        Ok(rows
            .iter()
            .flat_map(|(m, _)| [m.sender_id, m.receiver_id])
            .collect())
    }
}
