//! Schema creation. Idempotent; run on every open.
//!
//! Tables:
//!
//! ```sql
//! users(id, username UNIQUE, created_at)
//! messages(id, sender_id, receiver_id, parent_id, content, created_at, edited, edited_at, is_read, version)
//! notifications(id, user_id, message_id UNIQUE, is_read, created_at)
//! message_history(id, message_id, old_content, edited_at, edited_by)
//! store_revision(id = 1, revision)
//! ```
//!
//! User references on messages and notifications are `DEFERRABLE INITIALLY DEFERRED`: an account
//! row may be removed first and its dependents cleaned up later in the same transaction; anything
//! left behind fails the commit.

use sqlx::SqlitePool;
use tracing::info;

pub async fn init(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Creating database tables if not exist");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id INTEGER NOT NULL
                REFERENCES users(id) DEFERRABLE INITIALLY DEFERRED,
            receiver_id INTEGER NOT NULL
                REFERENCES users(id) DEFERRABLE INITIALLY DEFERRED,
            parent_id INTEGER
                REFERENCES messages(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            edited INTEGER NOT NULL DEFAULT 0,
            edited_at TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL
                REFERENCES users(id) DEFERRABLE INITIALLY DEFERRED,
            message_id INTEGER NOT NULL UNIQUE
                REFERENCES messages(id) ON DELETE CASCADE,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS message_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id INTEGER NOT NULL
                REFERENCES messages(id) ON DELETE CASCADE,
            old_content TEXT NOT NULL,
            edited_at TEXT NOT NULL,
            edited_by INTEGER
                REFERENCES users(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // History rows are append-only. `edited_by` stays writable so ON DELETE SET NULL can fire.
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS message_history_append_only
        BEFORE UPDATE OF message_id, old_content, edited_at ON message_history
        BEGIN
            SELECT RAISE(ABORT, 'message history is append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS store_revision (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            revision INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO store_revision (id, revision) VALUES (1, 0)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_messages_sender_id ON messages(sender_id);
        CREATE INDEX IF NOT EXISTS idx_messages_receiver_id ON messages(receiver_id);
        CREATE INDEX IF NOT EXISTS idx_messages_parent_id ON messages(parent_id);
        CREATE INDEX IF NOT EXISTS idx_messages_unread ON messages(receiver_id, is_read);
        CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id);
        CREATE INDEX IF NOT EXISTS idx_history_message_id ON message_history(message_id);
        CREATE INDEX IF NOT EXISTS idx_history_edited_by ON message_history(edited_by);
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database tables created successfully");
    Ok(())
}
