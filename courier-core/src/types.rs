//! Core records: user, message, notification, edit history, and the summaries built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type MessageId = i64;

/// Account referenced by messages. Owned by an outer identity system; the core only keeps id and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// One unit of communication; `parent_id` links a reply to the message it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub parent_id: Option<MessageId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// True iff at least one [`MessageHistory`] row exists for this message.
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub read: bool,
    /// Bumped on every mutation of this row.
    pub version: i64,
}

impl Message {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_thread_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Content shortened to `max` characters, with an ellipsis when cut.
    pub fn preview(&self, max: usize) -> String {
        if self.content.chars().count() > max {
            let cut: String = self.content.chars().take(max).collect();
            format!("{}...", cut)
        } else {
            self.content.clone()
        }
    }
}

/// Alert addressed to a message's receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: UserId,
    pub message_id: MessageId,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Immutable snapshot of a message's content taken just before it was overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHistory {
    pub id: i64,
    pub message_id: MessageId,
    pub old_content: String,
    pub edited_at: DateTime<Utc>,
    pub edited_by: Option<UserId>,
}

/// Rows removed while cleaning up after an account deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupSummary {
    pub messages_deleted: u64,
    pub notifications_deleted: u64,
    pub history_deleted: u64,
}

impl CleanupSummary {
    pub fn is_empty(&self) -> bool {
        self.messages_deleted == 0 && self.notifications_deleted == 0 && self.history_deleted == 0
    }
}

/// Per-user counts of the data a deletion would touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDataSummary {
    pub sent_messages: i64,
    pub received_messages: i64,
    pub notifications: i64,
    pub message_edits: i64,
}

/// Limit/offset pagination for listings. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub fn first(limit: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    /// SQLite treats a negative LIMIT as "no limit".
    pub fn sql_limit(&self) -> i64 {
        self.limit.unwrap_or(-1)
    }

    pub fn sql_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
