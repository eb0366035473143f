//! Message record model for persistence.
//!
//! Maps to the `messages` table and is used by MessageRepository and ThreadRepository.

use chrono::{DateTime, Utc};
use courier_core::{Message, MessageId, UserId};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRecord {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub version: i64,
}

impl From<MessageRecord> for Message {
    fn from(r: MessageRecord) -> Self {
        Message {
            id: r.id,
            sender_id: r.sender_id,
            receiver_id: r.receiver_id,
            parent_id: r.parent_id,
            content: r.content,
            created_at: r.created_at,
            edited: r.edited,
            edited_at: r.edited_at,
            read: r.is_read,
            version: r.version,
        }
    }
}

/// A message row joined with its distance from the thread root.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ThreadRow {
    #[sqlx(flatten)]
    pub message: MessageRecord,
    pub depth: i64,
}

/// Fields supplied by the caller when sending; the store fills in id, timestamps and flags.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub parent_id: Option<MessageId>,
}

impl NewMessage {
    pub fn new(sender_id: UserId, receiver_id: UserId, content: impl Into<String>) -> Self {
        Self {
            sender_id,
            receiver_id,
            content: content.into(),
            parent_id: None,
        }
    }

    pub fn reply_to(mut self, parent_id: MessageId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}
