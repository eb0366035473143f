//! Revision-keyed cache of thread trees.
//!
//! An entry is served only while the store revision it was read at is still current and it is
//! younger than the TTL. Any committed write bumps the revision, so writes invalidate every entry
//! without the cache being told.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_core::{MessageId, ThreadTree};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
struct CachedThread {
    revision: i64,
    stored_at: Instant,
    tree: Arc<ThreadTree>,
}

#[derive(Debug)]
pub struct ThreadCache {
    ttl: Duration,
    entries: RwLock<HashMap<MessageId, CachedThread>>,
}

impl ThreadCache {
    /// A zero `ttl` disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub async fn get(&self, root: MessageId, revision: i64) -> Option<Arc<ThreadTree>> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.read().await;
        let entry = entries.get(&root)?;
        if entry.revision == revision && entry.stored_at.elapsed() < self.ttl {
            debug!(root_id = root, revision, "Thread cache hit");
            Some(entry.tree.clone())
        } else {
            None
        }
    }

    pub async fn put(&self, root: MessageId, revision: i64, tree: Arc<ThreadTree>) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(&root) {
            if existing.revision > revision {
                debug!(root_id = root, revision, cached = existing.revision, "Skipping stale thread");
                return;
            }
        }
        // Drop entries from older revisions; they can never be served again.
        entries.retain(|_, cached| cached.revision >= revision);
        entries.insert(
            root,
            CachedThread {
                revision,
                stored_at: Instant::now(),
                tree,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_core::Message;

    fn tree(root: MessageId) -> Arc<ThreadTree> {
        let message = Message {
            id: root,
            sender_id: 1,
            receiver_id: 2,
            parent_id: None,
            content: "root".to_string(),
            created_at: Utc::now(),
            edited: false,
            edited_at: None,
            read: false,
            version: 1,
        };
        Arc::new(ThreadTree::from_levels(vec![(message, 0)]).unwrap())
    }

    #[tokio::test]
    async fn test_hit_only_at_same_revision() {
        let cache = ThreadCache::new(Duration::from_secs(60));
        cache.put(1, 5, tree(1)).await;

        assert!(cache.get(1, 5).await.is_some());
        assert!(cache.get(1, 6).await.is_none());
        assert!(cache.get(2, 5).await.is_none());
    }

    #[tokio::test]
    async fn test_newer_revision_evicts_older_entries() {
        let cache = ThreadCache::new(Duration::from_secs(60));
        cache.put(1, 5, tree(1)).await;
        cache.put(2, 7, tree(2)).await;

        assert_eq!(cache.len().await, 1);
        assert!(cache.get(2, 7).await.is_some());
    }

    #[tokio::test]
    async fn test_late_put_from_older_revision_keeps_newer_entry() {
        let cache = ThreadCache::new(Duration::from_secs(60));
        let fresh = tree(1);
        cache.put(1, 7, fresh.clone()).await;
        cache.put(1, 5, tree(1)).await;

        let served = cache.get(1, 7).await.expect("newer entry kept");
        assert!(Arc::ptr_eq(&served, &fresh));
        assert!(cache.get(1, 5).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_served() {
        let cache = ThreadCache::new(Duration::from_millis(10));
        cache.put(1, 5, tree(1)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get(1, 5).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_disables() {
        let cache = ThreadCache::new(Duration::ZERO);
        cache.put(1, 5, tree(1)).await;

        assert!(!cache.is_enabled());
        assert_eq!(cache.len().await, 0);
        assert!(cache.get(1, 5).await.is_none());
    }
}
