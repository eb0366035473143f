//! `MessagingService`: the call surface of the messaging core.
//!
//! Every mutation runs in one write transaction that starts by bumping the store revision, raises
//! its [`Event`] through the [`EventChain`] on the same connection, and commits. Transient store
//! errors are retried per the configured [`RetryPolicy`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use courier_core::{
    CleanupSummary, CourierError, Effect, Event, Message, MessageHistory, MessageId, Notification,
    Page, Result, ThreadTree, User, UserDataSummary, UserId,
};
use event_chain::{ChainReport, EventChain, Subscriber};
use serde::Serialize;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use storage::{MessageQuery, NewMessage, Store, StorageError};
use tracing::{info, instrument, warn};

use crate::auditor::EditAuditor;
use crate::cache::ThreadCache;
use crate::cleanup::CleanupCoordinator;
use crate::config::CourierConfig;
use crate::dispatcher::NotificationDispatcher;
use crate::retry::{with_retry, RetryPolicy};

/// Outcome of a send. The message is committed even when `dispatch_error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub message: Message,
    pub notification: Option<Notification>,
    #[serde(skip)]
    pub dispatch_error: Option<CourierError>,
}

impl SendReceipt {
    pub fn is_delivered(&self) -> bool {
        self.notification.is_some() && self.dispatch_error.is_none()
    }
}

#[derive(Clone)]
pub struct MessagingService {
    store: Store,
    chain: EventChain,
    dispatcher: NotificationDispatcher,
    cache: Arc<ThreadCache>,
    retry: RetryPolicy,
}

impl MessagingService {
    /// Opens the store named by `config` and wires the default subscribers.
    pub async fn connect(config: &CourierConfig) -> Result<Self> {
        let store = Store::open_with_depth(&config.database_url, config.max_thread_depth).await?;
        Ok(Self::new(store, config))
    }

    /// Registers the Edit Auditor, Notification Dispatcher and Cleanup Coordinator.
    pub fn new(store: Store, config: &CourierConfig) -> Self {
        let dispatcher = NotificationDispatcher::new();
        let chain = EventChain::new()
            .add_subscriber(Arc::new(EditAuditor::new()))
            .add_subscriber(Arc::new(dispatcher))
            .add_subscriber(Arc::new(CleanupCoordinator::new()));

        info!(
            max_thread_depth = store.threads.max_depth(),
            thread_cache_ttl = ?config.thread_cache_ttl,
            "Messaging service ready"
        );
        Self {
            store,
            chain,
            dispatcher,
            cache: Arc::new(ThreadCache::new(config.thread_cache_ttl)),
            retry: config.retry_policy(),
        }
    }

    /// Adds a subscriber after the built-in ones. Its `after` hook runs before theirs.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.chain = self.chain.add_subscriber(subscriber);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Current store revision; changes whenever persisted data does. Usable as a cache key.
    pub async fn revision(&self) -> Result<i64> {
        Ok(self.store.revision().await?)
    }

    // ----- users -----

    #[instrument(skip(self))]
    pub async fn create_user(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CourierError::InvalidReference(
                "username must not be empty".to_string(),
            ));
        }
        with_retry(&self.retry, "create_user", || async move {
            let (mut tx, _) = self.store.begin_write().await?;
            let user = self.store.users.create(&mut tx, username).await?;
            commit(tx).await?;
            info!(user_id = user.id, username = %user.username, "Created user");
            Ok(user)
        })
        .await
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<User> {
        let mut conn = self.store.acquire().await?;
        self.require_user(&mut conn, user_id).await
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<User> {
        let mut conn = self.store.acquire().await?;
        self.store
            .users
            .find_by_username(&mut conn, username)
            .await?
            .ok_or_else(|| CourierError::NotFound(format!("user {:?}", username)))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let mut conn = self.store.acquire().await?;
        Ok(self.store.users.list(&mut conn).await?)
    }

    pub async fn user_summary(&self, user_id: UserId) -> Result<UserDataSummary> {
        let mut conn = self.store.acquire().await?;
        self.require_user(&mut conn, user_id).await?;
        Ok(self.store.users.data_summary(&mut conn, user_id).await?)
    }

    // ----- sending and editing -----

    /// Creates a message and notifies its receiver. A reply's parent must exist and the reply
    /// must stay within the thread depth bound.
    #[instrument(skip(self, content), fields(content_len = content.len()))]
    pub async fn send_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
        parent_id: Option<MessageId>,
    ) -> Result<SendReceipt> {
        let mut new = NewMessage::new(sender_id, receiver_id, content);
        if let Some(parent_id) = parent_id {
            new = new.reply_to(parent_id);
        }
        with_retry(&self.retry, "send_message", || self.try_send(&new)).await
    }

    async fn try_send(&self, new: &NewMessage) -> Result<SendReceipt> {
        let (mut tx, revision) = self.store.begin_write().await?;

        self.require_user(&mut tx, new.sender_id).await?;
        self.require_user(&mut tx, new.receiver_id).await?;
        if let Some(parent_id) = new.parent_id {
            self.check_parent(&mut tx, parent_id, 0).await?;
        }

        let message = self.store.messages.insert(&mut tx, new).await?;
        let event = Event::MessageCreated {
            message: message.clone(),
        };
        let report = self.chain.after(&mut tx, &event).await?;
        commit(tx).await?;

        let notification = report.effects.into_iter().find_map(|effect| match effect {
            Effect::Notified(n) => Some(n),
            _ => None,
        });
        let dispatch_error = report.failures.into_iter().next().map(|failure| {
            match failure.error {
                err @ CourierError::DispatchFailure(_) => err,
                other => CourierError::DispatchFailure(format!("{}: {}", failure.subscriber, other)),
            }
        });

        match &dispatch_error {
            Some(err) => warn!(
                message_id = message.id,
                revision,
                error = %err,
                "Message stored, notification not delivered"
            ),
            None => info!(message_id = message.id, revision, "Message sent"),
        }

        Ok(SendReceipt {
            message,
            notification,
            dispatch_error,
        })
    }

    /// Replaces the content of a message, editor defaulting to its sender.
    pub async fn edit_message(&self, message_id: MessageId, new_content: &str) -> Result<Message> {
        self.edit_message_by(message_id, new_content, None).await
    }

    /// Replaces the content of a message. When the content actually changes, the previous content
    /// is recorded as history in the same transaction, ahead of the write.
    #[instrument(skip(self, new_content))]
    pub async fn edit_message_by(
        &self,
        message_id: MessageId,
        new_content: &str,
        editor: Option<UserId>,
    ) -> Result<Message> {
        with_retry(&self.retry, "edit_message", || {
            self.try_edit(message_id, new_content, editor)
        })
        .await
    }

    async fn try_edit(
        &self,
        message_id: MessageId,
        new_content: &str,
        editor: Option<UserId>,
    ) -> Result<Message> {
        let (mut tx, _) = self.store.begin_write().await?;

        let current = self.store.messages.lock_for_update(&mut tx, message_id).await?;
        if let Some(editor) = editor {
            self.require_user(&mut tx, editor).await?;
        }
        let event = Event::MessageUpdated {
            editor: Some(editor.unwrap_or(current.sender_id)),
            current,
            new_content: new_content.to_string(),
        };

        let before = self.chain.before(&mut tx, &event).await?;
        let audited = audited_entry(&before);
        let edited_at = audited.map(|h| h.edited_at).unwrap_or_else(Utc::now);

        let updated = self
            .store
            .messages
            .write_content(&mut tx, message_id, new_content, audited.is_some(), edited_at)
            .await?;
        self.chain.after(&mut tx, &event).await?;
        commit(tx).await?;

        info!(
            message_id,
            audited = audited.is_some(),
            version = updated.version,
            "Message updated"
        );
        Ok(updated)
    }

    /// Moves a message (with its replies) under `new_parent`, or makes it a root with `None`.
    /// Rejects a parent inside the message's own subtree.
    #[instrument(skip(self))]
    pub async fn reparent_message(
        &self,
        message_id: MessageId,
        new_parent: Option<MessageId>,
    ) -> Result<Message> {
        with_retry(&self.retry, "reparent_message", || async move {
            let (mut tx, _) = self.store.begin_write().await?;
            self.store.messages.get(&mut tx, message_id).await?;

            if let Some(parent_id) = new_parent {
                if self
                    .store
                    .threads
                    .is_in_subtree(&mut tx, message_id, parent_id)
                    .await?
                {
                    return Err(CourierError::InvalidReference(format!(
                        "message {} cannot reply to {}: that would create a cycle",
                        message_id, parent_id
                    )));
                }
                let height = self.store.threads.height_of(&mut tx, message_id).await?;
                self.check_parent(&mut tx, parent_id, height).await?;
            }

            let moved = self
                .store
                .messages
                .set_parent(&mut tx, message_id, new_parent)
                .await?;
            commit(tx).await?;
            info!(message_id, parent_id = ?new_parent, "Message reparented");
            Ok(moved)
        })
        .await
    }

    /// Parent must exist, and a subtree `height` levels tall hung below it must stay within the
    /// depth bound.
    async fn check_parent(
        &self,
        conn: &mut SqliteConnection,
        parent_id: MessageId,
        height: u32,
    ) -> Result<()> {
        let parent_depth = match self.store.threads.depth_of(conn, parent_id).await {
            Ok(depth) => depth,
            Err(StorageError::NotFound(_)) => {
                return Err(CourierError::InvalidReference(format!(
                    "parent message {} does not exist",
                    parent_id
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let max_depth = self.store.threads.max_depth();
        if parent_depth + 1 + height > max_depth {
            return Err(CourierError::InvalidReference(format!(
                "reply to message {} would exceed the thread depth limit of {}",
                parent_id, max_depth
            )));
        }
        Ok(())
    }

    // ----- read state -----

    /// Marks one message read. Already-read messages are left as they are.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, message_id: MessageId) -> Result<()> {
        with_retry(&self.retry, "mark_read", || async move {
            let (mut tx, _) = self.store.begin_write().await?;
            self.store.messages.get(&mut tx, message_id).await?;
            let changed = self.store.messages.mark_read(&mut tx, message_id).await?;
            commit(tx).await?;
            info!(message_id, changed, "Marked message read");
            Ok(())
        })
        .await
    }

    /// Marks every unread message addressed to `user_id` read, except ones the user sent.
    #[instrument(skip(self))]
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64> {
        with_retry(&self.retry, "mark_all_read", || async move {
            let (mut tx, _) = self.store.begin_write().await?;
            self.require_user(&mut tx, user_id).await?;
            let updated = self.store.messages.mark_all_read(&mut tx, user_id).await?;
            commit(tx).await?;
            Ok(updated)
        })
        .await
    }

    pub async fn list_unread(&self, user_id: UserId, page: Page) -> Result<Vec<Message>> {
        self.get_user(user_id).await?;
        Ok(self.store.unread.list(user_id, page).await?)
    }

    pub async fn count_unread(&self, user_id: UserId) -> Result<i64> {
        self.get_user(user_id).await?;
        Ok(self.store.unread.count(user_id).await?)
    }

    // ----- threads -----

    /// The thread rooted at `root_id`, served from the cache while the store revision holds.
    #[instrument(skip(self))]
    pub async fn get_thread(&self, root_id: MessageId) -> Result<Arc<ThreadTree>> {
        let mut tx = self.store.begin_read().await?;
        let revision = self.store.revision_on(&mut tx).await?;
        if let Some(tree) = self.cache.get(root_id, revision).await {
            return Ok(tree);
        }

        let tree = Arc::new(self.load_thread(&mut tx, root_id).await?);
        commit(tx).await?;
        self.cache.put(root_id, revision, tree.clone()).await;
        Ok(tree)
    }

    /// Same as [`get_thread`](Self::get_thread), bypassing the cache.
    pub async fn get_thread_fresh(&self, root_id: MessageId) -> Result<ThreadTree> {
        let mut conn = self.store.acquire().await?;
        self.load_thread(&mut conn, root_id).await
    }

    async fn load_thread(
        &self,
        conn: &mut SqliteConnection,
        root_id: MessageId,
    ) -> Result<ThreadTree> {
        let rows = self.store.threads.subtree(conn, root_id).await?;
        ThreadTree::from_levels(rows)
    }

    /// Root plus every descendant, ordered by depth, then creation time.
    pub async fn thread_messages(&self, root_id: MessageId) -> Result<Vec<Message>> {
        let mut conn = self.store.acquire().await?;
        let rows = self.store.threads.subtree(&mut conn, root_id).await?;
        Ok(rows.into_iter().map(|(message, _)| message).collect())
    }

    pub async fn thread_root(&self, message_id: MessageId) -> Result<Message> {
        let mut conn = self.store.acquire().await?;
        Ok(self.store.threads.root_of(&mut conn, message_id).await?)
    }

    pub async fn all_replies(&self, message_id: MessageId) -> Result<Vec<Message>> {
        let mut conn = self.store.acquire().await?;
        Ok(self.store.threads.all_replies(&mut conn, message_id).await?)
    }

    pub async fn reply_count(&self, message_id: MessageId) -> Result<i64> {
        let mut conn = self.store.acquire().await?;
        Ok(self.store.threads.reply_count(&mut conn, message_id).await?)
    }

    pub async fn thread_participants(&self, root_id: MessageId) -> Result<BTreeSet<UserId>> {
        let mut conn = self.store.acquire().await?;
        Ok(self.store.threads.participants(&mut conn, root_id).await?)
    }

    // ----- listings -----

    pub async fn get_message(&self, message_id: MessageId) -> Result<Message> {
        let mut conn = self.store.acquire().await?;
        Ok(self.store.messages.get(&mut conn, message_id).await?)
    }

    pub async fn list_messages(&self, query: &MessageQuery) -> Result<Vec<Message>> {
        let mut conn = self.store.acquire().await?;
        self.require_user(&mut conn, query.user_id).await?;
        Ok(self.store.messages.list_for_user(&mut conn, query).await?)
    }

    /// Edit history of a message, oldest first.
    pub async fn message_history(&self, message_id: MessageId) -> Result<Vec<MessageHistory>> {
        let mut conn = self.store.acquire().await?;
        self.store.messages.get(&mut conn, message_id).await?;
        Ok(self.store.history.for_message(&mut conn, message_id).await?)
    }

    pub async fn user_edits(&self, user_id: UserId) -> Result<Vec<MessageHistory>> {
        let mut conn = self.store.acquire().await?;
        self.require_user(&mut conn, user_id).await?;
        Ok(self.store.history.by_editor(&mut conn, user_id).await?)
    }

    // ----- notifications -----

    pub async fn notifications(&self, user_id: UserId, page: Page) -> Result<Vec<Notification>> {
        let mut conn = self.store.acquire().await?;
        self.require_user(&mut conn, user_id).await?;
        Ok(self
            .store
            .notifications
            .list_for_user(&mut conn, user_id, page)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn mark_notification_read(&self, notification_id: i64) -> Result<Notification> {
        with_retry(&self.retry, "mark_notification_read", || async move {
            let (mut tx, _) = self.store.begin_write().await?;
            let notification = self
                .store
                .notifications
                .mark_read(&mut tx, notification_id)
                .await?;
            commit(tx).await?;
            Ok(notification)
        })
        .await
    }

    /// Delivers the notification for an existing message if an earlier dispatch failed. Returns
    /// the existing notification when there is one.
    #[instrument(skip(self))]
    pub async fn redeliver_notification(&self, message_id: MessageId) -> Result<Notification> {
        with_retry(&self.retry, "redeliver_notification", || async move {
            let (mut tx, _) = self.store.begin_write().await?;
            let message = self.store.messages.get(&mut tx, message_id).await?;
            let notification = self.dispatcher.dispatch(&mut tx, &message).await?;
            commit(tx).await?;
            Ok(notification)
        })
        .await
    }

    // ----- deletion -----

    /// Deletes a message with its replies, their notifications and history.
    #[instrument(skip(self))]
    pub async fn delete_message(&self, message_id: MessageId) -> Result<CleanupSummary> {
        with_retry(&self.retry, "delete_message", || async move {
            let (mut tx, _) = self.store.begin_write().await?;
            let summary = self.store.cleanup.purge_message(&mut tx, message_id).await?;
            commit(tx).await?;
            Ok(summary)
        })
        .await
    }

    /// Deletes a user and everything tied to it. Deleting an unknown or already deleted user
    /// reports an empty summary.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: UserId) -> Result<CleanupSummary> {
        with_retry(&self.retry, "delete_user", || self.try_delete_user(user_id)).await
    }

    async fn try_delete_user(&self, user_id: UserId) -> Result<CleanupSummary> {
        let (mut tx, _) = self.store.begin_write().await?;

        let Some(user) = self.store.users.delete(&mut tx, user_id).await? else {
            commit(tx).await?;
            info!(user_id, "User already gone, nothing to clean up");
            return Ok(CleanupSummary::default());
        };

        let event = Event::UserDeleted { user };
        let report = self.chain.after(&mut tx, &event).await?;
        let summary = report
            .effects
            .iter()
            .find_map(|effect| match effect {
                Effect::CleanedUp(summary) => Some(*summary),
                _ => None,
            })
            .unwrap_or_default();

        // Deferred user references are checked here; a failure means something still points at
        // the deleted user.
        tx.commit().await.map_err(|e| match StorageError::from(e) {
            StorageError::Constraint(m) => CourierError::ConflictOnCleanup(format!(
                "user {} still referenced at commit: {}",
                user_id, m
            )),
            other => other.into(),
        })?;

        info!(
            user_id,
            messages_deleted = summary.messages_deleted,
            notifications_deleted = summary.notifications_deleted,
            history_deleted = summary.history_deleted,
            "Deleted user"
        );
        Ok(summary)
    }

    async fn require_user(&self, conn: &mut SqliteConnection, user_id: UserId) -> Result<User> {
        self.store
            .users
            .find(conn, user_id)
            .await?
            .ok_or_else(|| CourierError::user_not_found(user_id))
    }
}

fn audited_entry(report: &ChainReport) -> Option<&MessageHistory> {
    report.effects.iter().find_map(|effect| match effect {
        Effect::Audited(entry) => Some(entry),
        _ => None,
    })
}

async fn commit(tx: Transaction<'static, Sqlite>) -> Result<()> {
    tx.commit().await.map_err(StorageError::from)?;
    Ok(())
}
