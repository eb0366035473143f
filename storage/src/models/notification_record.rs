//! Notification record model; maps to the `notifications` table.

use chrono::{DateTime, Utc};
use courier_core::Notification;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub user_id: i64,
    pub message_id: i64,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRecord> for Notification {
    fn from(r: NotificationRecord) -> Self {
        Notification {
            id: r.id,
            user_id: r.user_id,
            message_id: r.message_id,
            is_read: r.is_read,
            created_at: r.created_at,
        }
    }
}
