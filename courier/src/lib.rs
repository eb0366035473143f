//! # courier
//!
//! The messaging core: [`MessagingService`] over the SQLite entity store, with the Edit Auditor,
//! Notification Dispatcher and Cleanup Coordinator wired as event-chain subscribers.

pub mod auditor;
pub mod cache;
pub mod cleanup;
pub mod config;
pub mod dispatcher;
pub mod retry;
pub mod service;

pub use auditor::EditAuditor;
pub use cache::ThreadCache;
pub use cleanup::CleanupCoordinator;
pub use config::CourierConfig;
pub use dispatcher::NotificationDispatcher;
pub use retry::{with_retry, RetryPolicy};
pub use service::{MessagingService, SendReceipt};

pub use courier_core::{
    CleanupSummary, CourierError, Message, MessageHistory, MessageId, Notification, Page, Result,
    ThreadTree, User, UserDataSummary, UserId,
};
pub use storage::{MessageDirection, MessageQuery};
