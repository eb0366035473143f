//! # courier-core
//!
//! Core types of the messaging backend: users, messages, notifications and edit history, the typed
//! [`Event`]s raised by mutations, the arena [`ThreadTree`], the [`CourierError`] taxonomy and
//! tracing initialisation. Storage-agnostic; used by storage, event-chain and courier.

pub mod error;
pub mod events;
pub mod logger;
pub mod thread;
pub mod types;

pub use error::{CourierError, Result};
pub use events::{Effect, Event, EventKind};
pub use logger::{init_tracing, init_tracing_with};
pub use thread::{ThreadNode, ThreadTree};
pub use types::{
    CleanupSummary, Message, MessageHistory, MessageId, Notification, Page, User, UserDataSummary,
    UserId,
};
