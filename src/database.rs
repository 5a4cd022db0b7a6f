use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::command::SqlCommand;
use crate::config::DacConfig;
use crate::connection::{BatchFuture, DbConnection, acquisition_error};
use crate::driver::{Connector, supervise};
use crate::error::DacError;
use crate::materializer::FillTarget;
use crate::policy::ExecOptions;
use crate::results::{DataReader, DataSet, DataTable};
use crate::types::{DatabaseType, RowValues};

/// Acquire a connection, run one operation, apply the policy, and release the connection.
macro_rules! with_connection {
    ($db:ident, $options:ident, $operation:literal, $fallback:expr, |$conn:ident| $body:expr) => {{
        match $db.open_connection_with($options).await {
            Ok(mut $conn) => {
                let outcome = $body.await;
                let outcome = $options.policy.apply(outcome, $operation, $fallback);
                $conn.release(outcome).await
            }
            Err(err) => $options.policy.apply(Err(err), $operation, $fallback),
        }
    }};
}

/// Entry point for executing commands against one database.
///
/// Cloning is cheap; clones share the connection pool. Every operation takes an
/// [`ExecOptions`] whose policy decides which failure categories propagate. A swallowed
/// failure is logged and the operation returns an empty default instead.
///
/// ```rust,no_run
/// use sql_dac::prelude::*;
///
/// # async fn demo() -> Result<(), DacError> {
/// let config = DacConfig::new(DatabaseType::Sqlite, "app.db");
/// let db = Database::from_config(&config).await?;
///
/// let query = SqlCommand::text("SELECT id, name FROM users WHERE active = @active")
///     .param("@active", true)
///     .window(0, 50);
/// let users = db.get_data_table(&query, &ExecOptions::default()).await?;
/// println!("{} users", users.row_count());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Database {
    connector: Arc<dyn Connector>,
    connection_string: Arc<str>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("database_type", &self.connector.database_type())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Wrap a connector. The connection string is kept for diagnostics only.
    pub fn new(connection_string: impl Into<String>, connector: impl Connector) -> Self {
        Self::from_connector(connection_string, Arc::new(connector))
    }

    #[must_use]
    pub fn from_connector(connection_string: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connection_string: Arc::from(connection_string.into()),
        }
    }

    /// Build the pool for the configured provider.
    ///
    /// # Errors
    ///
    /// Returns `DacError::SqlExecution` if the pool cannot be created, or
    /// `DacError::Generic` if the provider is not compiled in.
    pub async fn from_config(config: &DacConfig) -> Result<Self, DacError> {
        debug!(provider = ?config.provider, "building database from configuration");
        let connector = match config.provider {
            DatabaseType::Sqlite => sqlite_connector(config).await?,
            DatabaseType::Postgres => postgres_connector(config).await?,
        };
        Ok(Self::from_connector(config.default_connection.clone(), connector))
    }

    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    #[must_use]
    pub fn database_type(&self) -> Option<DatabaseType> {
        self.connector.database_type()
    }

    /// Obtain a connection the caller releases with [`DbConnection::close`] or by dropping it.
    ///
    /// # Errors
    ///
    /// Returns `DacError::SqlExecution` when no connection can be obtained.
    pub async fn open_connection(&self) -> Result<DbConnection, DacError> {
        self.open_connection_with(&ExecOptions::default()).await
    }

    async fn open_connection_with(&self, options: &ExecOptions) -> Result<DbConnection, DacError> {
        let driver = supervise(&options.context, self.connector.connect(), async {})
            .await
            .map_err(acquisition_error)?;
        let mut conn = DbConnection::new(driver);
        conn.set_context(options.context.clone());
        Ok(conn)
    }

    /// Run caller logic on a fresh connection, released afterwards.
    ///
    /// See [`DbConnection::execute_batch`].
    ///
    /// # Errors
    ///
    /// Returns the failure of acquisition, of the logic, or of the release, unless the
    /// policy swallows it.
    pub async fn execute_batch<T, F>(&self, batch: F, options: &ExecOptions) -> Result<T, DacError>
    where
        T: Default + Send,
        F: for<'c> FnOnce(&'c mut DbConnection) -> BatchFuture<'c, T> + Send,
    {
        match self.open_connection_with(options).await {
            Ok(mut conn) => conn.execute_batch(batch, true, options).await,
            Err(err) => options.policy.apply(Err(err), "execute_batch", T::default),
        }
    }

    /// Run caller logic inside a transaction on a fresh connection, released afterwards.
    ///
    /// See [`DbConnection::execute_transactional_batch`].
    ///
    /// # Errors
    ///
    /// As [`Database::execute_batch`], plus begin and commit failures.
    pub async fn execute_transactional_batch<T, F>(
        &self,
        batch: F,
        options: &ExecOptions,
    ) -> Result<T, DacError>
    where
        T: Default + Send,
        F: for<'c> FnOnce(&'c mut DbConnection) -> BatchFuture<'c, T> + Send,
    {
        match self.open_connection_with(options).await {
            Ok(mut conn) => conn.execute_transactional_batch(batch, true, options).await,
            Err(err) => options
                .policy
                .apply(Err(err), "execute_transactional_batch", T::default),
        }
    }

    /// Fill a [`DataTable`] or [`DataSet`] chosen by the runtime type of `target`.
    ///
    /// `target` is left untouched when a failure is swallowed.
    ///
    /// # Errors
    ///
    /// Returns `DacError::Generic` naming `T` when it is neither container, plus the
    /// failures of [`Database::fill_data_table`].
    pub async fn fill_data<T: Any + Send>(
        &self,
        target: &mut T,
        command: &SqlCommand,
        options: &ExecOptions,
    ) -> Result<(), DacError> {
        let target = match FillTarget::resolve(target) {
            Ok(target) => target,
            Err(err) => return options.policy.apply(Err(err), "fill_data", || ()),
        };
        with_connection!(self, options, "fill_data", || (), |conn| conn.fill_with(
            target,
            command,
            Some(&options.policy)
        ))
    }

    /// Every result set of the command as a new [`DataSet`].
    ///
    /// # Errors
    ///
    /// Returns `DacError::SqlExecution` for driver failures and `DacError::NonZeroReturnCode`
    /// for a non-zero status, unless the policy swallows them.
    pub async fn get_data_set(
        &self,
        command: &SqlCommand,
        options: &ExecOptions,
    ) -> Result<DataSet, DacError> {
        with_connection!(self, options, "get_data_set", DataSet::default, |conn| conn
            .set_with(command, Some(&options.policy)))
    }

    /// Append every result set of the command to `target`.
    ///
    /// # Errors
    ///
    /// As [`Database::get_data_set`].
    pub async fn fill_data_set(
        &self,
        target: &mut DataSet,
        command: &SqlCommand,
        options: &ExecOptions,
    ) -> Result<(), DacError> {
        with_connection!(self, options, "fill_data_set", || (), |conn| conn.fill_with(
            FillTarget::Set(target),
            command,
            Some(&options.policy)
        ))
    }

    /// The first result set of the command as a new [`DataTable`].
    ///
    /// # Errors
    ///
    /// As [`Database::get_data_set`], plus `DacError::Generic` when the command produced no
    /// result set.
    pub async fn get_data_table(
        &self,
        command: &SqlCommand,
        options: &ExecOptions,
    ) -> Result<DataTable, DacError> {
        with_connection!(self, options, "get_data_table", DataTable::default, |conn| conn
            .table_with(command, Some(&options.policy)))
    }

    /// Append the first result set of the command to `target`.
    ///
    /// # Errors
    ///
    /// As [`Database::get_data_table`], plus `DacError::Generic` when the columns differ from
    /// those already in `target`.
    pub async fn fill_data_table(
        &self,
        target: &mut DataTable,
        command: &SqlCommand,
        options: &ExecOptions,
    ) -> Result<(), DacError> {
        with_connection!(self, options, "fill_data_table", || (), |conn| conn.fill_with(
            FillTarget::Table(target),
            command,
            Some(&options.policy)
        ))
    }

    /// Every result set of the command behind a forward-only reader.
    ///
    /// The rows are read before the connection is released, so the reader outlives it.
    ///
    /// # Errors
    ///
    /// As [`Database::get_data_set`].
    pub async fn execute_reader(
        &self,
        command: &SqlCommand,
        options: &ExecOptions,
    ) -> Result<DataReader, DacError> {
        with_connection!(self, options, "execute_reader", DataReader::default, |conn| conn
            .reader_with(command, Some(&options.policy)))
    }

    /// Number of rows changed by the command.
    ///
    /// # Errors
    ///
    /// As [`Database::get_data_set`].
    pub async fn execute_non_query(
        &self,
        command: &SqlCommand,
        options: &ExecOptions,
    ) -> Result<u64, DacError> {
        with_connection!(self, options, "execute_non_query", u64::default, |conn| conn
            .non_query_with(command, Some(&options.policy)))
    }

    /// First column of the first row, or `RowValues::Null`.
    ///
    /// # Errors
    ///
    /// As [`Database::get_data_set`].
    pub async fn execute_scalar(
        &self,
        command: &SqlCommand,
        options: &ExecOptions,
    ) -> Result<RowValues, DacError> {
        with_connection!(self, options, "execute_scalar", RowValues::default, |conn| conn
            .scalar_with(command, Some(&options.policy)))
    }
}

#[cfg(feature = "sqlite")]
async fn sqlite_connector(config: &DacConfig) -> Result<Arc<dyn Connector>, DacError> {
    let options = crate::sqlite::SqliteOptions::new(config.default_connection.clone())
        .with_pool_size(config.pool_size);
    let connector = crate::sqlite::SqliteConnector::new(options)
        .await
        .map_err(acquisition_error)?;
    Ok(Arc::new(connector))
}

#[cfg(not(feature = "sqlite"))]
async fn sqlite_connector(_config: &DacConfig) -> Result<Arc<dyn Connector>, DacError> {
    Err(DacError::generic(
        "provider `sqlite` is not enabled; build with the `sqlite` feature",
    ))
}

#[cfg(feature = "postgres")]
async fn postgres_connector(config: &DacConfig) -> Result<Arc<dyn Connector>, DacError> {
    let options =
        crate::postgres::PostgresOptions::from_connection_string(&config.default_connection)
            .map_err(acquisition_error)?
            .with_pool_size(config.pool_size);
    let connector = crate::postgres::PostgresConnector::new(options)
        .await
        .map_err(acquisition_error)?;
    Ok(Arc::new(connector))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_connector(_config: &DacConfig) -> Result<Arc<dyn Connector>, DacError> {
    Err(DacError::generic(
        "provider `postgres` is not enabled; build with the `postgres` feature",
    ))
}
