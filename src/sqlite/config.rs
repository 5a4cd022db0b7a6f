use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::{ManageConnection, Pool, PooledConnection};
use tokio::sync::Mutex;

use super::connection::SqliteConnection;
use crate::driver::{Connector, DatabaseType, DriverConnection};
use crate::error::DriverError;

/// A `rusqlite` connection shared with the blocking worker that runs its statements.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

pub type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

/// Options for configuring a `SQLite` pool.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// File path, `:memory:`, or a `file:` URI.
    pub db_path: String,
    pub pool_size: u32,
    pub busy_timeout: Duration,
    /// Switch file databases to write-ahead logging when a connection opens.
    pub wal: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            pool_size: 8,
            busy_timeout: Duration::from_secs(5),
            wal: true,
        }
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    fn is_memory(&self) -> bool {
        self.db_path == ":memory:" || self.db_path.contains("mode=memory")
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: u32) -> Self {
        self.opts.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build the pooled connector.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` if the pool cannot be created.
    pub async fn build(self) -> Result<SqliteConnector, DriverError> {
        SqliteConnector::new(self.finish()).await
    }
}

/// bb8 manager for `rusqlite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    options: SqliteOptions,
}

impl SqliteManager {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self { options }
    }

    fn open(&self) -> Result<rusqlite::Connection, rusqlite::Error> {
        let conn = rusqlite::Connection::open(&self.options.db_path)?;
        conn.busy_timeout(self.options.busy_timeout)?;
        if self.options.wal && !self.options.is_memory() {
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        }
        Ok(conn)
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = rusqlite::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let opened = self.open();
        async move { opened.map(|conn| Arc::new(Mutex::new(conn))) }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            let guard = conn.lock().await;
            guard.execute_batch("SELECT 1")
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Opens pooled `SQLite` connections for a [`crate::Database`].
#[derive(Clone)]
pub struct SqliteConnector {
    pool: Pool<SqliteManager>,
}

impl SqliteConnector {
    /// Create the pool described by `options`.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` if the pool cannot be created.
    pub async fn new(options: SqliteOptions) -> Result<Self, DriverError> {
        let pool = Pool::builder()
            .max_size(options.pool_size.max(1))
            .build(SqliteManager::new(options))
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<SqliteManager> {
        &self.pool
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn database_type(&self) -> Option<DatabaseType> {
        Some(DatabaseType::Sqlite)
    }

    async fn connect(&self) -> Result<Box<dyn DriverConnection>, DriverError> {
        let conn = self.pool.get_owned().await.map_err(|e| {
            DriverError::ConnectionError(format!("sqlite checkout error: {e}"))
        })?;
        Ok(Box::new(SqliteConnection::new(conn)))
    }
}
