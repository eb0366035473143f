//! Cleanup Coordinator: removes everything a deleted user sent, received or was notified about.

use async_trait::async_trait;
use courier_core::{CleanupSummary, CourierError, Effect, Event, EventKind, Result, UserId};
use event_chain::Subscriber;
use sqlx::SqliteConnection;
use storage::CleanupRepository;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupCoordinator {
    cleanup: CleanupRepository,
}

impl CleanupCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes notifications, then history, then messages (with reply subtrees) for `user_id`,
    /// and checks that nothing still references the user.
    pub async fn clean_up(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<CleanupSummary> {
        let summary = self.cleanup.purge_user(conn, user_id).await?;

        let remaining = self.cleanup.remaining_references(conn, user_id).await?;
        if remaining > 0 {
            warn!(user_id, remaining, "Rows still reference deleted user");
            return Err(CourierError::ConflictOnCleanup(format!(
                "{} rows still reference user {} after cleanup",
                remaining, user_id
            )));
        }

        info!(
            user_id,
            messages_deleted = summary.messages_deleted,
            notifications_deleted = summary.notifications_deleted,
            history_deleted = summary.history_deleted,
            "Cleaned up user data"
        );
        Ok(summary)
    }
}

#[async_trait]
impl Subscriber for CleanupCoordinator {
    fn handles(&self, kind: EventKind) -> bool {
        kind == EventKind::UserDeleted
    }

    async fn after(&self, conn: &mut SqliteConnection, event: &Event) -> Result<Effect> {
        match event {
            Event::UserDeleted { user } => Ok(Effect::CleanedUp(self.clean_up(conn, user.id).await?)),
            _ => Ok(Effect::None),
        }
    }
}
