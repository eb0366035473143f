//! Typed events raised by data mutations, and the effects subscribers report back.

use serde::{Deserialize, Serialize};

use crate::types::{CleanupSummary, Message, MessageHistory, Notification, User, UserId};

/// A data mutation, delivered synchronously to subscribers inside the mutating transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A message row was inserted. Delivered in the after phase only.
    MessageCreated { message: Message },
    /// A message is about to be updated. `current` is the locked row as stored right now;
    /// the before phase runs ahead of the write, the after phase once it is applied.
    MessageUpdated {
        current: Message,
        new_content: String,
        editor: Option<UserId>,
    },
    /// A user row was removed; dependents may still exist until the after phase completes.
    UserDeleted { user: User },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    MessageCreated,
    MessageUpdated,
    UserDeleted,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::MessageCreated { .. } => EventKind::MessageCreated,
            Event::MessageUpdated { .. } => EventKind::MessageUpdated,
            Event::UserDeleted { .. } => EventKind::UserDeleted,
        }
    }

    /// Whether an update event carries content different from what is stored.
    pub fn changes_content(&self) -> bool {
        match self {
            Event::MessageUpdated {
                current,
                new_content,
                ..
            } => current.content != *new_content,
            _ => false,
        }
    }
}

/// What a subscriber did in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to report.
    None,
    Notified(Notification),
    Audited(MessageHistory),
    CleanedUp(CleanupSummary),
}
