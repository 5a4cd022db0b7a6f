use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{debug, error, warn};

use crate::command::SqlCommand;
use crate::driver::{CommandRequest, DriverConnection, Execution};
use crate::error::{DacError, DriverError};
use crate::materializer::{self, FillTarget, ResultShape};
use crate::params::SqlParameters;
use crate::policy::{CallContext, ExecOptions, ExecutionPolicy};
use crate::results::{DataReader, DataSet, DataTable};
use crate::types::RowValues;

/// Future returned by batch logic. It borrows the connection for the duration of the batch.
pub type BatchFuture<'c, T> = BoxFuture<'c, Result<T, DacError>>;

/// A connection obtained from a [`crate::Database`].
///
/// Every operation that takes a `&SqlCommand` runs on this connection with the cancellation
/// and timeout set by [`DbConnection::set_context`], or by the enclosing batch.
pub struct DbConnection {
    driver: Option<Box<dyn DriverConnection>>,
    context: CallContext,
    in_transaction: bool,
    rollback_only: bool,
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("open", &self.driver.is_some())
            .field("in_transaction", &self.in_transaction)
            .field("rollback_only", &self.rollback_only)
            .finish_non_exhaustive()
    }
}

/// Values produced by one command, before projection to the caller's shape.
pub(crate) struct CommandOutput {
    pub(crate) tables: Vec<DataTable>,
    pub(crate) rows_affected: u64,
    pub(crate) returned: SqlParameters,
    status: Option<i64>,
}

impl CommandOutput {
    /// Turn a non-zero status into a failure, unless `policy` swallows it.
    fn checked(self, policy: Option<&ExecutionPolicy>) -> Result<Self, DacError> {
        match self.status {
            Some(code) if code != 0 => {
                let err = DacError::non_zero_return_code(code, self.returned.clone());
                match policy {
                    Some(policy) if !policy.raises(&err) => {
                        warn!(code, "non-zero return code suppressed by execution policy");
                        Ok(self)
                    }
                    _ => Err(err),
                }
            }
            _ => Ok(self),
        }
    }
}

impl DbConnection {
    pub(crate) fn new(driver: Box<dyn DriverConnection>) -> Self {
        Self {
            driver: Some(driver),
            context: CallContext::default(),
            in_transaction: false,
            rollback_only: false,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Make the enclosing transactional batch roll back even if its logic returns `Ok`.
    pub fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    #[must_use]
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Cancellation and timeout applied to each following command.
    pub fn set_context(&mut self, context: CallContext) {
        self.context = context;
    }

    fn driver(&mut self) -> Result<&mut Box<dyn DriverConnection>, DacError> {
        self.driver
            .as_mut()
            .ok_or_else(|| DacError::generic("connection is closed"))
    }

    async fn run(&mut self, command: &SqlCommand, shape: ResultShape) -> Result<Execution, DacError> {
        debug!(kind = ?command.kind, ?shape, sql = %command.sql, "executing command");
        let context = self.context.clone();
        let request = CommandRequest {
            command,
            shape,
            context: &context,
        };
        let execution = self.driver()?.execute(request).await?;
        Ok(execution)
    }

    /// Execute and split the trailing output row from the data result sets.
    pub(crate) async fn run_command(
        &mut self,
        command: &SqlCommand,
        shape: ResultShape,
    ) -> Result<CommandOutput, DacError> {
        let Execution {
            mut result_sets,
            rows_affected,
        } = self.run(command, shape).await?;

        let mut parameters = command.parameters.clone();
        let mut status = None;
        if parameters.has_outputs() {
            if let Some(trailing) = result_sets.pop() {
                parameters.absorb_outputs(trailing.head_pairs());
            }
            if let Some(indicator) = parameters.status() {
                status = Some(status_code(&indicator.value)?);
            }
        }

        Ok(CommandOutput {
            tables: result_sets.into_iter().map(|r| r.table).collect(),
            rows_affected,
            returned: parameters.returned(),
            status,
        })
    }

    /// Execute a command and return the number of rows it changed.
    ///
    /// # Errors
    ///
    /// Returns `DacError::SqlExecution` for driver failures and
    /// `DacError::NonZeroReturnCode` when the status parameter is non-zero.
    pub async fn execute_non_query(&mut self, command: &SqlCommand) -> Result<u64, DacError> {
        self.non_query_with(command, None).await
    }

    pub(crate) async fn non_query_with(
        &mut self,
        command: &SqlCommand,
        policy: Option<&ExecutionPolicy>,
    ) -> Result<u64, DacError> {
        let out = self.run_command(command, ResultShape::NonQuery).await?;
        Ok(out.checked(policy)?.rows_affected)
    }

    /// First column of the first row, or `RowValues::Null` when there is none.
    ///
    /// # Errors
    ///
    /// As [`DbConnection::execute_non_query`].
    pub async fn execute_scalar(&mut self, command: &SqlCommand) -> Result<RowValues, DacError> {
        self.scalar_with(command, None).await
    }

    pub(crate) async fn scalar_with(
        &mut self,
        command: &SqlCommand,
        policy: Option<&ExecutionPolicy>,
    ) -> Result<RowValues, DacError> {
        let out = self.run_command(command, ResultShape::Scalar).await?;
        Ok(materializer::scalar(&out.checked(policy)?.tables))
    }

    /// Every result set of the command, behind a forward-only reader.
    ///
    /// # Errors
    ///
    /// As [`DbConnection::execute_non_query`].
    pub async fn execute_reader(&mut self, command: &SqlCommand) -> Result<DataReader, DacError> {
        self.reader_with(command, None).await
    }

    pub(crate) async fn reader_with(
        &mut self,
        command: &SqlCommand,
        policy: Option<&ExecutionPolicy>,
    ) -> Result<DataReader, DacError> {
        let out = self.run_command(command, ResultShape::Set).await?.checked(policy)?;
        Ok(DataReader::new(out.tables, out.rows_affected))
    }

    /// The first result set of the command, windowed by `command.window`.
    ///
    /// # Errors
    ///
    /// As [`DbConnection::execute_non_query`], plus `DacError::Generic` when the command
    /// produced no result set.
    pub async fn get_data_table(&mut self, command: &SqlCommand) -> Result<DataTable, DacError> {
        self.table_with(command, None).await
    }

    pub(crate) async fn table_with(
        &mut self,
        command: &SqlCommand,
        policy: Option<&ExecutionPolicy>,
    ) -> Result<DataTable, DacError> {
        let out = self.run_command(command, ResultShape::Table).await?;
        materializer::first_table(out.checked(policy)?.tables)
    }

    /// Every result set of the command, each windowed by `command.window`.
    ///
    /// # Errors
    ///
    /// As [`DbConnection::execute_non_query`].
    pub async fn get_data_set(&mut self, command: &SqlCommand) -> Result<DataSet, DacError> {
        self.set_with(command, None).await
    }

    pub(crate) async fn set_with(
        &mut self,
        command: &SqlCommand,
        policy: Option<&ExecutionPolicy>,
    ) -> Result<DataSet, DacError> {
        let out = self.run_command(command, ResultShape::Set).await?;
        Ok(materializer::into_set(out.checked(policy)?.tables))
    }

    /// Append the first result set of the command to `target`.
    ///
    /// # Errors
    ///
    /// As [`DbConnection::get_data_table`], plus `DacError::Generic` when the columns differ
    /// from those already in `target`.
    pub async fn fill_data_table(
        &mut self,
        target: &mut DataTable,
        command: &SqlCommand,
    ) -> Result<(), DacError> {
        self.fill_with(FillTarget::Table(target), command, None).await
    }

    /// Append every result set of the command to `target`.
    ///
    /// # Errors
    ///
    /// As [`DbConnection::get_data_set`].
    pub async fn fill_data_set(
        &mut self,
        target: &mut DataSet,
        command: &SqlCommand,
    ) -> Result<(), DacError> {
        self.fill_with(FillTarget::Set(target), command, None).await
    }

    /// Fill a [`DataTable`] or a [`DataSet`] chosen by the runtime type of `target`.
    ///
    /// # Errors
    ///
    /// Returns `DacError::Generic` naming the type when `T` is neither container.
    pub async fn fill_data<T: Any + Send>(
        &mut self,
        target: &mut T,
        command: &SqlCommand,
    ) -> Result<(), DacError> {
        let target = FillTarget::resolve(target)?;
        self.fill_with(target, command, None).await
    }

    pub(crate) async fn fill_with(
        &mut self,
        target: FillTarget<'_>,
        command: &SqlCommand,
        policy: Option<&ExecutionPolicy>,
    ) -> Result<(), DacError> {
        let out = self.run_command(command, target.shape()).await?;
        target.fill(out.checked(policy)?.tables)
    }

    /// # Errors
    ///
    /// Returns `DacError::Generic` when a transaction is already open.
    pub async fn begin_transaction(&mut self) -> Result<(), DacError> {
        if self.in_transaction {
            return Err(DacError::generic("transaction already in progress"));
        }
        debug!("begin transaction");
        self.driver()?.begin().await?;
        self.in_transaction = true;
        self.rollback_only = false;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DacError::Generic` without an open transaction, or the driver failure.
    pub async fn commit(&mut self) -> Result<(), DacError> {
        if !self.in_transaction {
            return Err(DacError::generic("no transaction in progress"));
        }
        debug!("commit transaction");
        self.driver()?.commit().await?;
        self.in_transaction = false;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DacError::Generic` without an open transaction, or the driver failure.
    pub async fn rollback(&mut self) -> Result<(), DacError> {
        if !self.in_transaction {
            return Err(DacError::generic("no transaction in progress"));
        }
        debug!("rollback transaction");
        // the flag is cleared even on failure; the driver discards the transaction on close
        self.in_transaction = false;
        self.driver()?.rollback().await?;
        Ok(())
    }

    /// Release the underlying connection. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DacError::SqlExecution` with the connection-close message.
    pub async fn close(&mut self) -> Result<(), DacError> {
        let Some(mut driver) = self.driver.take() else {
            return Ok(());
        };
        self.in_transaction = false;
        driver.close().await.map_err(DacError::connection_close)
    }

    /// Close the connection after `outcome` was decided.
    ///
    /// A close failure replaces a successful outcome but never a failed one.
    pub(crate) async fn release<T>(&mut self, outcome: Result<T, DacError>) -> Result<T, DacError> {
        let closed = self.close().await;
        match (outcome, closed) {
            (Err(primary), Err(close_err)) => {
                error!(error = %close_err, "connection close failed after a primary failure");
                Err(primary)
            }
            (Ok(_), Err(close_err)) => Err(close_err),
            (outcome, Ok(())) => outcome,
        }
    }

    /// Run caller logic on this connection.
    ///
    /// The logic receives `&mut DbConnection` and returns a boxed future; owned data is moved
    /// into the closure:
    ///
    /// ```rust,no_run
    /// # async fn demo(db: sql_dac::Database) -> Result<(), sql_dac::DacError> {
    /// use sql_dac::prelude::*;
    ///
    /// let mut conn = db.open_connection().await?;
    /// let insert = SqlCommand::text("INSERT INTO t(v) VALUES (@v)").param("@v", 1);
    /// let changed = conn
    ///     .execute_batch(
    ///         move |conn| Box::pin(async move { conn.execute_non_query(&insert).await }),
    ///         true,
    ///         &ExecOptions::default(),
    ///     )
    ///     .await?;
    /// # let _ = changed;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// A panic inside the logic is reported as `DacError::System`. When `close_connection` is
    /// set the connection is closed afterwards; a close failure never hides an earlier one.
    ///
    /// # Errors
    ///
    /// Returns the failure of the logic or of the close step, unless `options.policy`
    /// swallows it, in which case `T::default()` is returned.
    pub async fn execute_batch<T, F>(
        &mut self,
        batch: F,
        close_connection: bool,
        options: &ExecOptions,
    ) -> Result<T, DacError>
    where
        T: Default + Send,
        F: for<'c> FnOnce(&'c mut DbConnection) -> BatchFuture<'c, T> + Send,
    {
        let previous = std::mem::replace(&mut self.context, options.context.clone());
        let outcome = guarded(batch(&mut *self)).await;
        self.context = previous;

        let outcome = options.policy.apply(outcome, "execute_batch", T::default);
        if close_connection {
            self.release(outcome).await
        } else {
            outcome
        }
    }

    /// Run caller logic inside a transaction on this connection.
    ///
    /// The transaction commits when the logic returns `Ok` and rolls back when it returns
    /// `Err`, panics, or marks the connection with [`DbConnection::set_rollback_only`]. A
    /// failed rollback is logged and does not replace the failure that caused it.
    ///
    /// # Errors
    ///
    /// As [`DbConnection::execute_batch`], plus begin and commit failures.
    pub async fn execute_transactional_batch<T, F>(
        &mut self,
        batch: F,
        close_connection: bool,
        options: &ExecOptions,
    ) -> Result<T, DacError>
    where
        T: Default + Send,
        F: for<'c> FnOnce(&'c mut DbConnection) -> BatchFuture<'c, T> + Send,
    {
        let previous = std::mem::replace(&mut self.context, options.context.clone());
        let outcome = match self.begin_transaction().await {
            Ok(()) => {
                let outcome = guarded(batch(&mut *self)).await;
                self.settle(outcome).await
            }
            Err(err) => Err(err),
        };
        self.context = previous;

        let outcome = options
            .policy
            .apply(outcome, "execute_transactional_batch", T::default);
        if close_connection {
            self.release(outcome).await
        } else {
            outcome
        }
    }

    /// Commit or roll back according to the outcome of the transactional logic.
    async fn settle<T>(&mut self, outcome: Result<T, DacError>) -> Result<T, DacError> {
        if !self.in_transaction {
            // the logic already ended the transaction itself
            return outcome;
        }
        match outcome {
            Ok(value) if !self.rollback_only => match self.commit().await {
                Ok(()) => Ok(value),
                Err(commit_err) => {
                    self.rollback_secondary().await;
                    Err(commit_err)
                }
            },
            Ok(value) => {
                debug!("transaction marked rollback-only");
                self.rollback_only = false;
                self.rollback().await.map(|()| value)
            }
            Err(primary) => {
                self.rollback_secondary().await;
                Err(primary)
            }
        }
    }

    async fn rollback_secondary(&mut self) {
        if !self.in_transaction {
            return;
        }
        if let Err(rollback_err) = self.rollback().await {
            error!(error = %rollback_err, "rollback failed after a primary failure");
        }
    }
}

/// Await batch logic, turning a panic into a system failure.
async fn guarded<T>(future: BatchFuture<'_, T>) -> Result<T, DacError> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(DacError::from_panic(payload)),
    }
}

/// Interpret the status indicator. Null counts as success.
fn status_code(value: &RowValues) -> Result<i64, DacError> {
    match value {
        RowValues::Null => Ok(0),
        RowValues::Int(code) => Ok(*code),
        RowValues::Bool(flag) => Ok(i64::from(*flag)),
        RowValues::Text(text) => text.trim().parse::<i64>().map_err(|_| {
            DacError::generic(format!("status parameter value `{text}` is not an integer"))
        }),
        other => Err(DacError::generic(format!(
            "status parameter holds a {} value, expected an integer",
            other.type_name()
        ))),
    }
}

impl From<Box<dyn DriverConnection>> for DbConnection {
    fn from(driver: Box<dyn DriverConnection>) -> Self {
        Self::new(driver)
    }
}

/// Failure to obtain a connection is a SQL execution failure.
pub(crate) fn acquisition_error(err: DriverError) -> DacError {
    match err {
        DriverError::Internal(_) => DacError::system(err),
        other => DacError::sql(other),
    }
}
