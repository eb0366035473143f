//! SQLite connection pool wrapper for the storage crate.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_FILE_CONNECTIONS: u32 = 8;

/// Manages a single SQLite pool; creates the DB file if missing.
#[derive(Clone)]
pub struct SqlitePoolManager {
    pool: SqlitePool,
}

impl SqlitePoolManager {
    /// Creates a pool for the given database URL.
    ///
    /// Accepts `sqlite::memory:`, `sqlite://path` URLs and bare file paths. Foreign keys are always
    /// enforced. An in-memory database lives inside one connection, so such pools are capped at one.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        info!("Initializing SQLite pool: {}", database_url);

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let options = if database_url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(database_url)?
        } else {
            SqliteConnectOptions::new().filename(database_url)
        }
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

        let options = if in_memory {
            options
        } else {
            options.journal_mode(SqliteJournalMode::Wal)
        };

        let max_connections = if in_memory { 1 } else { MAX_FILE_CONNECTIONS };

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(BUSY_TIMEOUT * 2);
        if in_memory {
            // Recycling the only connection would drop the database with it.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;

        Ok(Self { pool })
    }

    /// Returns the underlying pool for running queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
