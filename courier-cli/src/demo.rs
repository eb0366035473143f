//! Scripted walkthroughs of the core behaviours, each on a fresh in-memory store.

use std::io::Write;

use anyhow::{bail, Result};
use courier::{CourierConfig, MessagingService, Page};

use crate::cli::Scenario;

pub async fn run(scenario: Scenario, out: &mut dyn Write) -> Result<()> {
    let service = MessagingService::connect(&CourierConfig::for_url("sqlite::memory:")).await?;
    match scenario {
        Scenario::Signals => signals(&service, out).await,
        Scenario::Editing => editing(&service, out).await,
        Scenario::Deletion => deletion(&service, out).await,
    }
}

async fn signals(service: &MessagingService, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "=== Notification demo ===")?;
    let alice = service.create_user("alice").await?;
    let bob = service.create_user("bob").await?;

    let before = service.notifications(bob.id, Page::default()).await?.len();
    writeln!(out, "Notifications for {} before: {}", bob.username, before)?;

    let receipt = service
        .send_message(
            alice.id,
            bob.id,
            "Hello Bob! This message should raise exactly one notification.",
            None,
        )
        .await?;
    let after = service.notifications(bob.id, Page::default()).await?.len();
    writeln!(out, "Notifications for {} after: {}", bob.username, after)?;

    let Some(notification) = receipt.notification else {
        bail!("no notification created for message {}", receipt.message.id);
    };
    writeln!(out, "Notification {} for user {}", notification.id, notification.user_id)?;
    writeln!(out, "Message: {}", receipt.message.preview(50))?;
    writeln!(out, "Is read: {}", notification.is_read)?;

    service.edit_message(receipt.message.id, "Hello Bob! (edited)").await?;
    let after_edit = service.notifications(bob.id, Page::default()).await?.len();
    writeln!(out, "Notifications after an edit: {}", after_edit)?;
    if after != before + 1 || after_edit != after {
        bail!("expected exactly one notification per message");
    }
    writeln!(out, "=== Demo complete ===")?;
    Ok(())
}

async fn editing(service: &MessagingService, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "=== Message editing demo ===")?;
    let alice = service.create_user("demo_alice").await?;
    let bob = service.create_user("demo_bob").await?;

    let message = service
        .send_message(
            alice.id,
            bob.id,
            "Hello Bob! This is the original message content.",
            None,
        )
        .await?
        .message;
    writeln!(out, "Created message {}: {:?} (edited: {})", message.id, message.content, message.edited)?;

    for content in [
        "Hello Bob! This is the UPDATED message content.",
        "Hello Bob! This is the FINAL version of the message.",
    ] {
        let updated = service.edit_message(message.id, content).await?;
        writeln!(out, "Edited to {:?} (edited: {})", updated.content, updated.edited)?;
    }

    let history = service.message_history(message.id).await?;
    writeln!(out, "History records: {}", history.len())?;
    for (i, entry) in history.iter().enumerate() {
        writeln!(
            out,
            "  {}. {:?} by user {:?} at {}",
            i + 1,
            entry.old_content,
            entry.edited_by,
            entry.edited_at
        )?;
    }
    writeln!(out, "=== Demo complete ===")?;
    Ok(())
}

async fn deletion(service: &MessagingService, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "=== User deletion demo ===")?;
    let doomed = service.create_user("demo_user_delete").await?;
    let keeper = service.create_user("demo_user_keep").await?;

    let first = service
        .send_message(doomed.id, keeper.id, "Message from user1 to user2", None)
        .await?
        .message;
    service
        .send_message(keeper.id, doomed.id, "Message from user2 to user1", None)
        .await?;
    service
        .edit_message(first.id, "Edited message from user1 to user2")
        .await?;

    let summary = service.user_summary(doomed.id).await?;
    writeln!(out, "Data for {} before deletion:", doomed.username)?;
    writeln!(out, "  sent: {}, received: {}", summary.sent_messages, summary.received_messages)?;
    writeln!(out, "  notifications: {}, edits: {}", summary.notifications, summary.message_edits)?;

    let cleanup = service.delete_user(doomed.id).await?;
    writeln!(out, "Cleanup statistics:")?;
    writeln!(out, "  messages deleted: {}", cleanup.messages_deleted)?;
    writeln!(out, "  notifications deleted: {}", cleanup.notifications_deleted)?;
    writeln!(out, "  history records deleted: {}", cleanup.history_deleted)?;

    let remaining = service.user_summary(keeper.id).await?;
    writeln!(out, "Remaining data for {}:", keeper.username)?;
    writeln!(out, "  sent: {}, received: {}", remaining.sent_messages, remaining.received_messages)?;
    writeln!(out, "  notifications: {}", remaining.notifications)?;

    let again = service.delete_user(doomed.id).await?;
    writeln!(out, "Deleting again removes {} message(s)", again.messages_deleted)?;
    writeln!(out, "=== Demo complete ===")?;
    Ok(())
}
