//! Executes parsed CLI commands against a [`MessagingService`].

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};
use courier::{MessageQuery, MessagingService, Page, ThreadTree, User, UserId};
use serde::Serialize;

use crate::cli::Commands;
use crate::demo;

pub async fn run(service: &MessagingService, command: Commands, out: &mut dyn Write) -> Result<()> {
    match command {
        Commands::AddUser { username } => {
            let user = service.create_user(&username).await?;
            print_json(out, &user)
        }
        Commands::Send {
            from,
            to,
            reply_to,
            content,
        } => {
            let sender = user_named(service, &from).await?;
            let receiver = user_named(service, &to).await?;
            let receipt = service
                .send_message(sender.id, receiver.id, &content, reply_to)
                .await?;
            print_json(out, &receipt)?;
            if let Some(err) = &receipt.dispatch_error {
                writeln!(
                    out,
                    "warning: message {} stored but not notified ({}): {}",
                    receipt.message.id,
                    err.code(),
                    err
                )?;
            }
            Ok(())
        }
        Commands::Edit {
            id,
            content,
            editor,
        } => {
            let editor = match editor {
                Some(name) => Some(user_named(service, &name).await?.id),
                None => None,
            };
            let message = service.edit_message_by(id, &content, editor).await?;
            print_json(out, &message)
        }
        Commands::Reparent { id, parent } => {
            let message = service.reparent_message(id, parent).await?;
            print_json(out, &message)
        }
        Commands::MarkRead { id } => {
            service.mark_read(id).await?;
            writeln!(out, "message {} marked read", id)?;
            Ok(())
        }
        Commands::MarkAllRead { username } => {
            let user = user_named(service, &username).await?;
            let updated = service.mark_all_read(user.id).await?;
            writeln!(out, "{} message(s) marked read for {}", updated, user.username)?;
            Ok(())
        }
        Commands::Thread { root } => {
            let tree = service.get_thread_fresh(root).await?;
            let names = usernames(service).await?;
            write_tree(out, &tree, &names)
        }
        Commands::Unread { username, limit } => {
            let user = user_named(service, &username).await?;
            let page = Page {
                limit,
                offset: None,
            };
            let messages = service.list_unread(user.id, page).await?;
            writeln!(
                out,
                "{} unread for {}",
                service.count_unread(user.id).await?,
                user.username
            )?;
            print_json(out, &messages)
        }
        Commands::Messages {
            username,
            direction,
            roots_only,
            limit,
            offset,
        } => {
            let user = user_named(service, &username).await?;
            let mut query = MessageQuery::for_user(user.id);
            query.direction = direction.into();
            query.roots_only = roots_only;
            query.page = Page { limit, offset };
            print_json(out, &service.list_messages(&query).await?)
        }
        Commands::History { id } => print_json(out, &service.message_history(id).await?),
        Commands::Edits { username } => {
            let user = user_named(service, &username).await?;
            print_json(out, &service.user_edits(user.id).await?)
        }
        Commands::Notifications { username, limit } => {
            let user = user_named(service, &username).await?;
            let page = Page {
                limit,
                offset: None,
            };
            print_json(out, &service.notifications(user.id, page).await?)
        }
        Commands::ReadNotification { id } => {
            print_json(out, &service.mark_notification_read(id).await?)
        }
        Commands::Summary { username } => {
            let user = user_named(service, &username).await?;
            print_json(out, &service.user_summary(user.id).await?)
        }
        Commands::DeleteMessage { id } => print_json(out, &service.delete_message(id).await?),
        Commands::DeleteUser { username } => {
            let user = user_named(service, &username).await?;
            print_json(out, &service.delete_user(user.id).await?)
        }
        Commands::Redeliver { id } => print_json(out, &service.redeliver_notification(id).await?),
        Commands::Demo { scenario } => demo::run(scenario, out).await,
    }
}

async fn user_named(service: &MessagingService, username: &str) -> Result<User> {
    service
        .find_user_by_username(username)
        .await
        .with_context(|| format!("Look up user {:?}", username))
}

async fn usernames(service: &MessagingService) -> Result<HashMap<UserId, String>> {
    Ok(service
        .list_users()
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect())
}

fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

const PREVIEW_LEN: usize = 60;

/// One line per message, indented two spaces per level, replies in thread order.
pub fn write_tree(
    out: &mut dyn Write,
    tree: &ThreadTree,
    names: &HashMap<UserId, String>,
) -> Result<()> {
    let name = |id: UserId| {
        names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("#{}", id))
    };
    for node in tree.depth_first() {
        let m = &node.message;
        writeln!(
            out,
            "{}[{}] {} -> {}: {}{}",
            "  ".repeat(node.depth as usize),
            m.id,
            name(m.sender_id),
            name(m.receiver_id),
            m.preview(PREVIEW_LEN),
            if m.edited { " (edited)" } else { "" }
        )?;
    }
    Ok(())
}
