//! Notification Dispatcher: one notification per created message, addressed to its receiver.

use async_trait::async_trait;
use courier_core::{CourierError, Effect, Event, EventKind, Message, Notification, Result};
use event_chain::Subscriber;
use sqlx::SqliteConnection;
use storage::NotificationRepository;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationDispatcher {
    notifications: NotificationRepository,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the notification for `message` unless it already exists; the unique key on
    /// `message_id` makes repeated calls return the same row.
    pub async fn dispatch(
        &self,
        conn: &mut SqliteConnection,
        message: &Message,
    ) -> Result<Notification> {
        let (notification, created) = self
            .notifications
            .insert_once(conn, message.receiver_id, message.id)
            .await
            .map_err(|e| {
                let cause = CourierError::from(e);
                warn!(message_id = message.id, error = %cause, "Notification dispatch failed");
                CourierError::DispatchFailure(format!("message {}: {}", message.id, cause))
            })?;

        if !created {
            info!(
                message_id = message.id,
                notification_id = notification.id,
                "Notification already delivered"
            );
        }
        Ok(notification)
    }
}

#[async_trait]
impl Subscriber for NotificationDispatcher {
    fn handles(&self, kind: EventKind) -> bool {
        kind == EventKind::MessageCreated
    }

    fn isolated(&self) -> bool {
        true
    }

    async fn after(&self, conn: &mut SqliteConnection, event: &Event) -> Result<Effect> {
        match event {
            Event::MessageCreated { message } => {
                Ok(Effect::Notified(self.dispatch(conn, message).await?))
            }
            _ => Ok(Effect::None),
        }
    }
}
