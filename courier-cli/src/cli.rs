//! CLI parser.

use clap::{Parser, Subcommand, ValueEnum};
use courier::MessageDirection;

#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Messaging core CLI: users, messages, threads, notifications, cleanup", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Overrides DATABASE_URL.
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a user.
    AddUser { username: String },
    /// Send a message, optionally as a reply.
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        reply_to: Option<i64>,
        content: String,
    },
    /// Replace a message's content (recorded in its edit history).
    Edit {
        id: i64,
        content: String,
        /// Username of the editor; defaults to the sender.
        #[arg(long)]
        editor: Option<String>,
    },
    /// Move a message under another parent, or to the top level without --parent.
    Reparent {
        id: i64,
        #[arg(long)]
        parent: Option<i64>,
    },
    MarkRead { id: i64 },
    MarkAllRead { username: String },
    /// Print the thread rooted at a message as an indented tree.
    Thread { root: i64 },
    Unread {
        username: String,
        #[arg(short, long)]
        limit: Option<i64>,
    },
    Messages {
        username: String,
        #[arg(long, value_enum, default_value = "both")]
        direction: Direction,
        #[arg(long)]
        roots_only: bool,
        #[arg(short, long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },
    /// Edit history of a message, oldest first.
    History { id: i64 },
    /// Edits made by a user.
    Edits { username: String },
    Notifications {
        username: String,
        #[arg(short, long)]
        limit: Option<i64>,
    },
    ReadNotification { id: i64 },
    /// Counts of a user's data.
    Summary { username: String },
    DeleteMessage { id: i64 },
    /// Delete a user and everything tied to it.
    DeleteUser { username: String },
    /// Create the notification for a message whose dispatch failed.
    Redeliver { id: i64 },
    /// Run a scripted scenario against a throwaway in-memory store.
    Demo {
        #[arg(value_enum)]
        scenario: Scenario,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
    Both,
}

impl From<Direction> for MessageDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Sent => MessageDirection::Sent,
            Direction::Received => MessageDirection::Received,
            Direction::Both => MessageDirection::Both,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// Message creation and its notification.
    Signals,
    /// Edits and the history they leave.
    Editing,
    /// User deletion and cleanup counts.
    Deletion,
}
