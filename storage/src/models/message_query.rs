//! Query parameters for listing a user's messages.
//!
//! Used by MessageRepository::list_for_user.

use courier_core::{Page, UserId};
use serde::{Deserialize, Serialize};

/// Which side of a conversation the user must be on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageDirection {
    Sent,
    Received,
    #[default]
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageQuery {
    pub user_id: UserId,
    pub direction: MessageDirection,
    /// Only thread roots (messages without a parent).
    pub roots_only: bool,
    pub page: Page,
}

impl MessageQuery {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            direction: MessageDirection::Both,
            roots_only: false,
            page: Page::default(),
        }
    }
}
