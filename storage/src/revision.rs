//! Store-wide revision counter.
//!
//! Every write transaction bumps the counter as its first statement. That takes SQLite's write lock
//! before anything is read, so a transaction never acts on a value another writer is about to
//! replace, and the counter doubles as a cache key that changes whenever persisted data does.

use sqlx::SqliteConnection;

use crate::error::Result;

/// Increments the revision and returns the new value. Call first inside a write transaction.
pub async fn bump(conn: &mut SqliteConnection) -> Result<i64> {
    let revision: i64 = sqlx::query_scalar(
        "UPDATE store_revision SET revision = revision + 1 WHERE id = 1 RETURNING revision",
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(revision)
}

pub async fn current(conn: &mut SqliteConnection) -> Result<i64> {
    let revision: i64 = sqlx::query_scalar("SELECT revision FROM store_revision WHERE id = 1")
        .fetch_one(&mut *conn)
        .await?;
    Ok(revision)
}
