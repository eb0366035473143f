//! Integration tests for [`courier::MessagingService`]: sending, notifications, read state.

mod common;

use courier::{CourierError, MessageDirection, MessageQuery, Page};

use common::{memory_service, users};

/// **Test: Exactly one notification per created message, none on updates.**
///
/// **Setup:** Users a, b; a sends three messages to b.
/// **Action:** Send, then edit and mark one read.
/// **Expected:** Each receipt carries a notification for b referencing its message; b has three
/// notifications before and after the updates.
#[tokio::test]
async fn test_one_notification_per_message() {
    let service = memory_service().await;
    let u = users(&service, &["a", "b"]).await;
    let (a, b) = (u[0].id, u[1].id);

    let mut sent = Vec::new();
    for i in 0..3 {
        let receipt = service
            .send_message(a, b, &format!("message {}", i), None)
            .await
            .expect("send");
        assert!(receipt.is_delivered());
        let notification = receipt.notification.clone().unwrap();
        assert_eq!(notification.user_id, b);
        assert_eq!(notification.message_id, receipt.message.id);
        assert!(!notification.is_read);
        sent.push(receipt.message);
    }

    service.edit_message(sent[0].id, "changed").await.unwrap();
    service.mark_read(sent[1].id).await.unwrap();

    let notes = service.notifications(b, Page::default()).await.unwrap();
    assert_eq!(notes.len(), 3);
    assert!(service.notifications(a, Page::default()).await.unwrap().is_empty());
}

/// **Test: A failed dispatch keeps the message and is reported, redelivery fixes it.**
///
/// **Setup:** A trigger that rejects every notification insert.
/// **Action:** Send a message; drop the trigger; `redeliver_notification` twice.
/// **Expected:** Message is stored with `dispatch_failure` on the receipt and no notification;
/// redelivery creates exactly one notification and repeating it returns the same row.
#[tokio::test]
async fn test_dispatch_failure_does_not_roll_back_send() {
    let service = memory_service().await;
    let u = users(&service, &["a", "b"]).await;
    let (a, b) = (u[0].id, u[1].id);

    sqlx::query(
        "CREATE TRIGGER notifications_offline BEFORE INSERT ON notifications \
         BEGIN SELECT RAISE(ABORT, 'notifications offline'); END",
    )
    .execute(service.store().pool())
    .await
    .unwrap();

    let receipt = service.send_message(a, b, "Hi", None).await.expect("send");
    assert!(receipt.notification.is_none());
    let err = receipt.dispatch_error.clone().expect("dispatch error reported");
    assert_eq!(err.code(), "dispatch_failure");
    assert!(!receipt.is_delivered());

    let stored = service.get_message(receipt.message.id).await.unwrap();
    assert_eq!(stored.content, "Hi");
    assert!(service.notifications(b, Page::default()).await.unwrap().is_empty());

    sqlx::query("DROP TRIGGER notifications_offline")
        .execute(service.store().pool())
        .await
        .unwrap();

    let first = service.redeliver_notification(stored.id).await.unwrap();
    let second = service.redeliver_notification(stored.id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.user_id, b);
    assert_eq!(service.notifications(b, Page::default()).await.unwrap().len(), 1);
}

/// **Test: Unknown users and parents are rejected without writing anything.**
#[tokio::test]
async fn test_send_rejects_bad_references() {
    let service = memory_service().await;
    let u = users(&service, &["a", "b"]).await;
    let (a, b) = (u[0].id, u[1].id);

    let err = service.send_message(a, 999, "x", None).await.unwrap_err();
    assert!(matches!(err, CourierError::NotFound(_)));

    let err = service.send_message(a, b, "x", Some(12345)).await.unwrap_err();
    assert_eq!(err.code(), "invalid_reference");

    let summary = service.user_summary(a).await.unwrap();
    assert_eq!(summary.sent_messages, 0);
}

/// **Test: mark-all-read clears the unread count but never touches self-sent messages.**
///
/// **Setup:** a sends b two messages; b sends itself a note and a message to a.
/// **Action:** `count_unread(b)`, `mark_all_read(b)`, `count_unread(b)`.
/// **Expected:** 2 unread before, 0 after; the self note stays unread and a's unread is 1.
#[tokio::test]
async fn test_mark_all_read_and_unread_count() {
    let service = memory_service().await;
    let u = users(&service, &["a", "b"]).await;
    let (a, b) = (u[0].id, u[1].id);

    service.send_message(a, b, "one", None).await.unwrap();
    service.send_message(a, b, "two", None).await.unwrap();
    let note = service.send_message(b, b, "note", None).await.unwrap().message;
    service.send_message(b, a, "back", None).await.unwrap();

    assert_eq!(service.count_unread(b).await.unwrap(), 2);
    let unread = service.list_unread(b, Page::default()).await.unwrap();
    assert_eq!(unread[0].content, "two");

    assert_eq!(service.mark_all_read(b).await.unwrap(), 2);
    assert_eq!(service.count_unread(b).await.unwrap(), 0);
    assert_eq!(service.mark_all_read(b).await.unwrap(), 0);

    assert!(!service.get_message(note.id).await.unwrap().read);
    assert_eq!(service.count_unread(a).await.unwrap(), 1);
}

/// **Test: Marking read is idempotent and never audits.**
#[tokio::test]
async fn test_mark_read_idempotent() {
    let service = memory_service().await;
    let u = users(&service, &["a", "b"]).await;
    let m = service
        .send_message(u[0].id, u[1].id, "Hi", None)
        .await
        .unwrap()
        .message;

    service.mark_read(m.id).await.unwrap();
    service.mark_read(m.id).await.unwrap();

    let stored = service.get_message(m.id).await.unwrap();
    assert!(stored.read);
    assert!(!stored.edited);
    assert!(service.message_history(m.id).await.unwrap().is_empty());

    let err = service.mark_read(4242).await.unwrap_err();
    assert_eq!(err.code(), "not_found");
}

/// **Test: Notification read flag and message listings.**
#[tokio::test]
async fn test_notifications_and_listings() {
    let service = memory_service().await;
    let u = users(&service, &["a", "b"]).await;
    let (a, b) = (u[0].id, u[1].id);

    let receipt = service.send_message(a, b, "Hi", None).await.unwrap();
    service.send_message(b, a, "Hello", None).await.unwrap();

    let note = receipt.notification.unwrap();
    let read = service.mark_notification_read(note.id).await.unwrap();
    assert!(read.is_read);
    assert!(service.mark_notification_read(note.id).await.unwrap().is_read);

    let mut query = MessageQuery::for_user(a);
    assert_eq!(service.list_messages(&query).await.unwrap().len(), 2);
    query.direction = MessageDirection::Sent;
    let sent = service.list_messages(&query).await.unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "Hi");

    let err = service.mark_notification_read(999).await.unwrap_err();
    assert_eq!(err.code(), "not_found");
}

/// **Test: Every write moves the revision forward; reads do not.**
#[tokio::test]
async fn test_revision_advances_on_writes() {
    let service = memory_service().await;
    let start = service.revision().await.unwrap();
    let u = users(&service, &["a", "b"]).await;
    let after_users = service.revision().await.unwrap();
    assert_eq!(after_users, start + 2);

    service.send_message(u[0].id, u[1].id, "Hi", None).await.unwrap();
    let after_send = service.revision().await.unwrap();
    assert!(after_send > after_users);

    service.count_unread(u[1].id).await.unwrap();
    assert_eq!(service.revision().await.unwrap(), after_send);
}

/// **Test: Duplicate usernames are rejected.**
#[tokio::test]
async fn test_duplicate_username() {
    let service = memory_service().await;
    users(&service, &["a"]).await;

    let err = service.create_user("a").await.unwrap_err();
    assert_eq!(err.code(), "already_exists");
    assert_eq!(service.find_user_by_username("a").await.unwrap().username, "a");
    assert_eq!(service.list_users().await.unwrap().len(), 1);
}
