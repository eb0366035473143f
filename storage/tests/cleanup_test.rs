//! Integration tests for [`storage::CleanupRepository`] and [`storage::UnreadIndex`].

use chrono::Utc;
use storage::{NewMessage, Store, StorageError};

/// **Test: Purging a user removes their messages, reply subtrees and dependents.**
///
/// **Setup:** A -> B "hi" (notified, edited once), C -> A reply under it, A -> C unrelated,
/// C -> D unrelated.
/// **Action:** Delete user B and purge inside one transaction, then commit.
/// **Expected:** "hi" and its reply are gone with their notification and history; A -> C and
/// C -> D survive; nothing references B.
#[tokio::test]
async fn test_purge_user_removes_owned_and_nested() {
    let store = Store::open("sqlite::memory:").await.expect("Failed to open store");
    let mut conn = store.acquire().await.unwrap();
    let a = store.users.create(&mut conn, "a").await.unwrap().id;
    let b = store.users.create(&mut conn, "b").await.unwrap().id;
    let c = store.users.create(&mut conn, "c").await.unwrap().id;
    let d = store.users.create(&mut conn, "d").await.unwrap().id;

    let hi = store
        .messages
        .insert(&mut conn, &NewMessage::new(a, b, "hi"))
        .await
        .unwrap();
    store.notifications.insert_once(&mut conn, b, hi.id).await.unwrap();
    store
        .history
        .append(&mut conn, hi.id, "hey", Some(a), Utc::now())
        .await
        .unwrap();
    store
        .messages
        .insert(&mut conn, &NewMessage::new(c, a, "me too").reply_to(hi.id))
        .await
        .unwrap();
    let keep_1 = store
        .messages
        .insert(&mut conn, &NewMessage::new(a, c, "unrelated"))
        .await
        .unwrap();
    let keep_2 = store
        .messages
        .insert(&mut conn, &NewMessage::new(c, d, "also unrelated"))
        .await
        .unwrap();
    drop(conn);

    let (mut tx, _) = store.begin_write().await.unwrap();
    let deleted = store.users.delete(&mut tx, b).await.unwrap();
    assert!(deleted.is_some());
    let summary = store.cleanup.purge_user(&mut tx, b).await.unwrap();
    assert_eq!(store.cleanup.remaining_references(&mut tx, b).await.unwrap(), 0);
    tx.commit().await.expect("commit with deferred keys satisfied");

    assert_eq!(summary.messages_deleted, 2);
    assert_eq!(summary.notifications_deleted, 1);
    assert_eq!(summary.history_deleted, 1);

    let mut conn = store.acquire().await.unwrap();
    assert_eq!(store.messages.count_all(&mut conn).await.unwrap(), 2);
    assert!(store.messages.find(&mut conn, keep_1.id).await.unwrap().is_some());
    assert!(store.messages.find(&mut conn, keep_2.id).await.unwrap().is_some());
    assert_eq!(store.notifications.count_all(&mut conn).await.unwrap(), 0);
    assert_eq!(store.history.count_all(&mut conn).await.unwrap(), 0);
}

/// **Test: Purging a user with no data is a no-op.**
#[tokio::test]
async fn test_purge_user_without_data() {
    let store = Store::open("sqlite::memory:").await.unwrap();
    let mut conn = store.acquire().await.unwrap();
    let lonely = store.users.create(&mut conn, "lonely").await.unwrap().id;

    let summary = store.cleanup.purge_user(&mut conn, lonely).await.unwrap();
    assert!(summary.is_empty());
}

/// **Test: Purging a single message takes its replies with it.**
///
/// **Setup:** root <- reply <- nested, plus a separate message.
/// **Action:** `purge_message(reply)`; then purge a missing id.
/// **Expected:** Two messages deleted, root and the separate message remain; the missing id is
/// `NotFound`.
#[tokio::test]
async fn test_purge_message_subtree() {
    let store = Store::open("sqlite::memory:").await.unwrap();
    let mut conn = store.acquire().await.unwrap();
    let a = store.users.create(&mut conn, "a").await.unwrap().id;
    let b = store.users.create(&mut conn, "b").await.unwrap().id;

    let root = store
        .messages
        .insert(&mut conn, &NewMessage::new(a, b, "root"))
        .await
        .unwrap();
    let reply = store
        .messages
        .insert(&mut conn, &NewMessage::new(b, a, "reply").reply_to(root.id))
        .await
        .unwrap();
    store
        .messages
        .insert(&mut conn, &NewMessage::new(a, b, "nested").reply_to(reply.id))
        .await
        .unwrap();
    store
        .messages
        .insert(&mut conn, &NewMessage::new(b, a, "separate"))
        .await
        .unwrap();

    let summary = store.cleanup.purge_message(&mut conn, reply.id).await.unwrap();
    assert_eq!(summary.messages_deleted, 2);
    assert_eq!(store.messages.count_all(&mut conn).await.unwrap(), 2);
    assert_eq!(store.threads.reply_count(&mut conn, root.id).await.unwrap(), 0);

    let err = store.cleanup.purge_message(&mut conn, 9999).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

/// **Test: History rows cannot be rewritten.**
#[tokio::test]
async fn test_history_is_append_only() {
    let store = Store::open("sqlite::memory:").await.unwrap();
    let mut conn = store.acquire().await.unwrap();
    let a = store.users.create(&mut conn, "a").await.unwrap().id;
    let m = store
        .messages
        .insert(&mut conn, &NewMessage::new(a, a, "draft"))
        .await
        .unwrap();
    let entry = store
        .history
        .append(&mut conn, m.id, "draft", Some(a), Utc::now())
        .await
        .unwrap();

    let result = sqlx::query("UPDATE message_history SET old_content = 'forged' WHERE id = ?")
        .bind(entry.id)
        .execute(&mut *conn)
        .await;
    assert!(result.is_err());

    let rows = store.history.for_message(&mut conn, m.id).await.unwrap();
    assert_eq!(rows[0].old_content, "draft");
}

/// **Test: Unread view filters and orders.**
///
/// **Setup:** Three messages A -> B, one read; one B -> B self-note; one B -> A.
/// **Action:** `unread.list(B)` / `unread.count(B)`.
/// **Expected:** The two unread messages from A, newest first; the self-note is never unread.
#[tokio::test]
async fn test_unread_view() {
    let store = Store::open("sqlite::memory:").await.unwrap();
    let mut conn = store.acquire().await.unwrap();
    let a = store.users.create(&mut conn, "a").await.unwrap().id;
    let b = store.users.create(&mut conn, "b").await.unwrap().id;

    let first = store
        .messages
        .insert(&mut conn, &NewMessage::new(a, b, "first"))
        .await
        .unwrap();
    store
        .messages
        .insert(&mut conn, &NewMessage::new(a, b, "second"))
        .await
        .unwrap();
    store
        .messages
        .insert(&mut conn, &NewMessage::new(a, b, "third"))
        .await
        .unwrap();
    store
        .messages
        .insert(&mut conn, &NewMessage::new(b, b, "note"))
        .await
        .unwrap();
    store
        .messages
        .insert(&mut conn, &NewMessage::new(b, a, "back"))
        .await
        .unwrap();
    store.messages.mark_read(&mut conn, first.id).await.unwrap();
    drop(conn);

    let unread = store.unread.list(b, Default::default()).await.unwrap();
    let contents: Vec<&str> = unread.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["third", "second"]);
    assert_eq!(store.unread.count(b).await.unwrap(), 2);
    assert_eq!(store.unread.count(a).await.unwrap(), 1);
}
