use std::future::Future;
use std::str::FromStr;

use async_trait::async_trait;
use bb8::{ManageConnection, Pool};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use super::connection::PostgresConnection;
use crate::driver::{Connector, DatabaseType, DriverConnection};
use crate::error::DriverError;

/// Options for configuring a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub config: tokio_postgres::Config,
    pub pool_size: u32,
}

impl PostgresOptions {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self {
            config,
            pool_size: 8,
        }
    }

    /// Parse a libpq-style connection string (`host=.. user=..`) or a `postgres://` URL.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` when the string cannot be parsed.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, DriverError> {
        Ok(Self::new(tokio_postgres::Config::from_str(connection_string)?))
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }
}

/// bb8 manager for Postgres clients.
pub struct PgManager {
    pub(crate) config: tokio_postgres::Config,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `DriverError` if pool creation fails.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<PgManager>, DriverError> {
        Pool::builder()
            .max_size(max_size.max(1))
            .build(self)
            .await
            .map_err(|e| DriverError::ConnectionError(format!("postgres pool error: {e}")))
    }
}

impl ManageConnection for PgManager {
    type Connection = Client;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        async move {
            debug!(
                hosts = ?cfg.get_hosts(),
                db = ?cfg.get_dbname(),
                user = ?cfg.get_user(),
                "postgres connect start"
            );
            let (client, connection) = cfg.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(error = %e, "postgres connection task ended with an error");
                }
            });
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

/// Opens pooled `PostgreSQL` connections for a [`crate::Database`].
#[derive(Clone)]
pub struct PostgresConnector {
    pool: Pool<PgManager>,
}

impl PostgresConnector {
    /// # Errors
    ///
    /// Returns `DriverError` if the pool cannot be created.
    pub async fn new(options: PostgresOptions) -> Result<Self, DriverError> {
        let pool = PgManager::new(options.config)
            .build_pool(options.pool_size)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<PgManager> {
        &self.pool
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    fn database_type(&self) -> Option<DatabaseType> {
        Some(DatabaseType::Postgres)
    }

    async fn connect(&self) -> Result<Box<dyn DriverConnection>, DriverError> {
        let conn = self.pool.get_owned().await.map_err(|e| {
            DriverError::ConnectionError(format!("postgres checkout error: {e}"))
        })?;
        Ok(Box::new(PostgresConnection::new(conn)))
    }
}
