//! Storage crate: the Entity Store for messages, notifications and edit history on SQLite.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`models`] – row records and list queries
//! - [`store`] – `Store`: pool plus repository handles, write-transaction entry point
//! - [`user_repo`], [`message_repo`], [`notification_repo`], [`history_repo`] – per-table repositories
//! - [`thread_repo`] – recursive thread queries
//! - [`unread`] – read-only unread view
//! - [`cleanup`] – ordered cascading deletes
//! - [`revision`] – store-wide write counter
//! - [`sqlite_pool`] – SqlitePoolManager

mod cleanup;
mod error;
mod history_repo;
mod message_repo;
mod models;
mod notification_repo;
mod revision;
mod schema;
mod sqlite_pool;
mod store;
mod thread_repo;
mod unread;
mod user_repo;


pub use cleanup::CleanupRepository;
pub use error::{Result, StorageError};
pub use history_repo::HistoryRepository;
pub use message_repo::MessageRepository;
pub use models::{
    HistoryRecord, MessageDirection, MessageQuery, MessageRecord, NewMessage, NotificationRecord,
    ThreadRow, UserRecord,
};
pub use notification_repo::NotificationRepository;
pub use sqlite_pool::SqlitePoolManager;
pub use store::Store;
pub use thread_repo::{ThreadRepository, DEFAULT_MAX_DEPTH};
pub use unread::UnreadIndex;
pub use user_repo::UserRepository;

/// Re-exported so callers can name the connection type repositories take.
pub use sqlx::SqliteConnection;
