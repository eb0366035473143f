//! Integration tests for [`storage::ThreadRepository`].
//!
//! Builds small reply trees in an in-memory SQLite database and checks the recursive queries.

use storage::{NewMessage, Store, StorageError};

/// alice -> bob root, bob -> alice reply, alice -> bob reply-to-reply, plus a second branch.
async fn seeded_thread(store: &Store) -> (i64, i64, i64, i64, i64) {
    let mut conn = store.acquire().await.expect("Failed to acquire connection");
    let alice = store.users.create(&mut conn, "alice").await.unwrap().id;
    let bob = store.users.create(&mut conn, "bob").await.unwrap().id;
    let carol = store.users.create(&mut conn, "carol").await.unwrap().id;

    let root = store
        .messages
        .insert(&mut conn, &NewMessage::new(alice, bob, "root"))
        .await
        .unwrap();
    let reply = store
        .messages
        .insert(&mut conn, &NewMessage::new(bob, alice, "reply").reply_to(root.id))
        .await
        .unwrap();
    let nested = store
        .messages
        .insert(&mut conn, &NewMessage::new(alice, bob, "nested").reply_to(reply.id))
        .await
        .unwrap();
    store
        .messages
        .insert(&mut conn, &NewMessage::new(carol, alice, "side").reply_to(root.id))
        .await
        .unwrap();

    (root.id, reply.id, nested.id, alice, carol)
}

/// **Test: Subtree is returned in level order with depths.**
///
/// **Setup:** Root with two direct replies, one of which has its own reply.
/// **Action:** `subtree(root)`.
/// **Expected:** Four rows; root at depth 0, both direct replies at depth 1 in insertion order,
/// the nested reply last at depth 2.
#[tokio::test]
async fn test_subtree_level_order() {
    let store = Store::open("sqlite::memory:").await.expect("Failed to open store");
    let (root, reply, nested, _, _) = seeded_thread(&store).await;
    let mut conn = store.acquire().await.unwrap();

    let rows = store.threads.subtree(&mut conn, root).await.expect("subtree");
    let shape: Vec<(String, u32)> = rows.iter().map(|(m, d)| (m.content.clone(), *d)).collect();
    assert_eq!(
        shape,
        vec![
            ("root".to_string(), 0),
            ("reply".to_string(), 1),
            ("side".to_string(), 1),
            ("nested".to_string(), 2),
        ]
    );

    let replies = store.threads.all_replies(&mut conn, reply).await.unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].id, nested);
}

/// **Test: Root and depth are found by walking parent links.**
///
/// **Setup:** Seeded thread.
/// **Action:** `root_of` / `depth_of` on the nested reply and on the root.
/// **Expected:** Both resolve to the root; depths 2 and 0.
#[tokio::test]
async fn test_root_and_depth() {
    let store = Store::open("sqlite::memory:").await.unwrap();
    let (root, _, nested, _, _) = seeded_thread(&store).await;
    let mut conn = store.acquire().await.unwrap();

    assert_eq!(store.threads.root_of(&mut conn, nested).await.unwrap().id, root);
    assert_eq!(store.threads.root_of(&mut conn, root).await.unwrap().id, root);
    assert_eq!(store.threads.depth_of(&mut conn, nested).await.unwrap(), 2);
    assert_eq!(store.threads.depth_of(&mut conn, root).await.unwrap(), 0);
    assert_eq!(store.threads.height_of(&mut conn, root).await.unwrap(), 2);
}

/// **Test: Reply counts, subtree membership and participants.**
///
/// **Setup:** Seeded thread with three users.
/// **Action:** `reply_count`, `is_in_subtree`, `participants`.
/// **Expected:** Root has 2 direct replies; nested lies under root but not the reverse; all three
/// users participate.
#[tokio::test]
async fn test_counts_membership_participants() {
    let store = Store::open("sqlite::memory:").await.unwrap();
    let (root, reply, nested, alice, carol) = seeded_thread(&store).await;
    let mut conn = store.acquire().await.unwrap();

    assert_eq!(store.threads.reply_count(&mut conn, root).await.unwrap(), 2);
    assert_eq!(store.threads.reply_count(&mut conn, nested).await.unwrap(), 0);

    assert!(store.threads.is_in_subtree(&mut conn, root, nested).await.unwrap());
    assert!(store.threads.is_in_subtree(&mut conn, reply, reply).await.unwrap());
    assert!(!store.threads.is_in_subtree(&mut conn, nested, root).await.unwrap());

    let people = store.threads.participants(&mut conn, root).await.unwrap();
    assert_eq!(people.len(), 3);
    assert!(people.contains(&alice));
    assert!(people.contains(&carol));
}

/// **Test: Missing messages are reported as not found.**
#[tokio::test]
async fn test_missing_message_not_found() {
    let store = Store::open("sqlite::memory:").await.unwrap();
    let mut conn = store.acquire().await.unwrap();

    assert!(matches!(
        store.threads.subtree(&mut conn, 77).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        store.threads.root_of(&mut conn, 77).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        store.threads.reply_count(&mut conn, 77).await,
        Err(StorageError::NotFound(_))
    ));
}

/// **Test: A chain longer than the depth bound is rejected instead of walked.**
///
/// **Setup:** Store bounded at depth 4; chain of 6 messages (depths 0..=5).
/// **Action:** `depth_of` on the last message; `subtree` from the first and second message.
/// **Expected:** `InvalidReference` for `depth_of` and for the subtree of the first message; the
/// subtree of the second message fits exactly and is returned whole.
#[tokio::test]
async fn test_depth_bound() {
    let store = Store::open_with_depth("sqlite::memory:", 4).await.unwrap();
    let mut conn = store.acquire().await.unwrap();
    let ids = chain(&store, 6).await;

    let err = store.threads.depth_of(&mut conn, ids[5]).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidReference(_)));

    let err = store.threads.subtree(&mut conn, ids[0]).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidReference(_)));

    let rows = store.threads.subtree(&mut conn, ids[1]).await.unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows.last().map(|(_, d)| *d), Some(4));
}

/// **Test: Lowering the bound over existing deep threads never yields a truncated thread.**
///
/// **Setup:** File database; a 6-message chain written under the default bound, then the same
/// file reopened with a bound of 3.
/// **Action:** `subtree`, `all_replies` and `participants` from the root.
/// **Expected:** All three fail with `InvalidReference`; a subtree starting two levels down
/// (height 3) still loads in full.
#[tokio::test]
async fn test_lowered_bound_rejects_deep_thread() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("threads.db").display());

    let ids = {
        let store = Store::open(&url).await.expect("Failed to open store");
        chain(&store, 6).await
    };

    let store = Store::open_with_depth(&url, 3).await.expect("Failed to reopen store");
    let mut conn = store.acquire().await.unwrap();

    assert!(matches!(
        store.threads.subtree(&mut conn, ids[0]).await,
        Err(StorageError::InvalidReference(_))
    ));
    assert!(matches!(
        store.threads.all_replies(&mut conn, ids[0]).await,
        Err(StorageError::InvalidReference(_))
    ));
    assert!(matches!(
        store.threads.participants(&mut conn, ids[0]).await,
        Err(StorageError::InvalidReference(_))
    ));

    let rows = store.threads.subtree(&mut conn, ids[2]).await.unwrap();
    assert_eq!(rows.len(), 4);
}

/// Linear reply chain of `len` messages from a to b; returns ids root first.
async fn chain(store: &Store, len: usize) -> Vec<i64> {
    let mut conn = store.acquire().await.unwrap();
    let a = store.users.create(&mut conn, "a").await.unwrap().id;
    let b = store.users.create(&mut conn, "b").await.unwrap().id;

    let mut ids = Vec::new();
    let mut parent = None;
    for i in 0..len {
        let mut new = NewMessage::new(a, b, format!("level {}", i));
        if let Some(p) = parent {
            new = new.reply_to(p);
        }
        let m = store.messages.insert(&mut conn, &new).await.unwrap();
        parent = Some(m.id);
        ids.push(m.id);
    }
    ids
}
