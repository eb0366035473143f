//! Edit history record model; maps to the append-only `message_history` table.

use chrono::{DateTime, Utc};
use courier_core::MessageHistory;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryRecord {
    pub id: i64,
    pub message_id: i64,
    pub old_content: String,
    pub edited_at: DateTime<Utc>,
    pub edited_by: Option<i64>,
}

impl From<HistoryRecord> for MessageHistory {
    fn from(r: HistoryRecord) -> Self {
        MessageHistory {
            id: r.id,
            message_id: r.message_id,
            old_content: r.old_content,
            edited_at: r.edited_at,
            edited_by: r.edited_by,
        }
    }
}
