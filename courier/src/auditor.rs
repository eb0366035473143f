//! Edit Auditor: snapshots the stored content before a content-changing update is written.

use async_trait::async_trait;
use chrono::Utc;
use courier_core::{Effect, Event, EventKind, Result};
use event_chain::Subscriber;
use sqlx::SqliteConnection;
use storage::HistoryRepository;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct EditAuditor {
    history: HistoryRepository,
}

impl EditAuditor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Subscriber for EditAuditor {
    fn handles(&self, kind: EventKind) -> bool {
        kind == EventKind::MessageUpdated
    }

    /// `current` was read under the write lock of the same transaction, so it is the content
    /// being replaced.
    async fn before(&self, conn: &mut SqliteConnection, event: &Event) -> Result<Effect> {
        let Event::MessageUpdated {
            current, editor, ..
        } = event
        else {
            return Ok(Effect::None);
        };

        if !event.changes_content() {
            debug!(message_id = current.id, "Content unchanged, no history recorded");
            return Ok(Effect::None);
        }

        let entry = self
            .history
            .append(conn, current.id, &current.content, *editor, Utc::now())
            .await?;
        Ok(Effect::Audited(entry))
    }
}
