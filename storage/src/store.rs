//! Entity Store: the pool plus one handle per repository.

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::info;

use crate::cleanup::CleanupRepository;
use crate::error::Result;
use crate::history_repo::HistoryRepository;
use crate::message_repo::MessageRepository;
use crate::notification_repo::NotificationRepository;
use crate::sqlite_pool::SqlitePoolManager;
use crate::thread_repo::{ThreadRepository, DEFAULT_MAX_DEPTH};
use crate::unread::UnreadIndex;
use crate::user_repo::UserRepository;
use crate::{revision, schema};

#[derive(Clone)]
pub struct Store {
    pool_manager: SqlitePoolManager,
    pub users: UserRepository,
    pub messages: MessageRepository,
    pub notifications: NotificationRepository,
    pub history: HistoryRepository,
    pub threads: ThreadRepository,
    pub cleanup: CleanupRepository,
    pub unread: UnreadIndex,
}

impl Store {
    /// Opens (creating if needed) the database at `database_url` with the default thread depth bound.
    pub async fn open(database_url: &str) -> Result<Self> {
        Self::open_with_depth(database_url, DEFAULT_MAX_DEPTH).await
    }

    pub async fn open_with_depth(database_url: &str, max_thread_depth: u32) -> Result<Self> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        schema::init(pool_manager.pool()).await?;

        info!(database_url, max_thread_depth, "Entity store ready");
        Ok(Self {
            unread: UnreadIndex::new(pool_manager.clone()),
            pool_manager,
            users: UserRepository,
            messages: MessageRepository,
            notifications: NotificationRepository,
            history: HistoryRepository,
            threads: ThreadRepository::new(max_thread_depth),
            cleanup: CleanupRepository,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        self.pool_manager.pool()
    }

    /// A pooled connection for reads outside a transaction.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool().acquire().await?)
    }

    /// Opens a write transaction and bumps the store revision as its first statement, which takes
    /// the write lock before anything is read.
    pub async fn begin_write(&self) -> Result<(Transaction<'static, Sqlite>, i64)> {
        let mut tx = self.pool().begin().await?;
        let revision = revision::bump(&mut tx).await?;
        Ok((tx, revision))
    }

    /// Opens a read transaction: every query in it sees one consistent snapshot.
    pub async fn begin_read(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool().begin().await?)
    }

    pub async fn revision(&self) -> Result<i64> {
        let mut conn = self.acquire().await?;
        revision::current(&mut conn).await
    }

    /// The revision as seen by `conn` (inside a read transaction, the snapshot's revision).
    pub async fn revision_on(&self, conn: &mut SqliteConnection) -> Result<i64> {
        revision::current(conn).await
    }
}
