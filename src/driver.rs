//! Interface between the façade and a database driver.
//!
//! A backend implements [`Connector`] to open connections and [`DriverConnection`] to run
//! commands on them. Rows are accumulated with a [`ResultCollector`] per result set so every
//! backend applies the same window and retention rules.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

pub use crate::command::{CommandKind, RowWindow, SqlCommand};
pub use crate::error::DriverError;
pub use crate::materializer::{CollectedResult, Retain, ResultCollector, ResultShape};
pub use crate::params::{ParamRole, Parameter, SqlParameters};
pub use crate::policy::CallContext;
pub use crate::results::DataColumn;
pub use crate::types::{DatabaseType, RowValues};

/// One command handed to [`DriverConnection::execute`].
#[derive(Debug, Clone, Copy)]
pub struct CommandRequest<'a> {
    pub command: &'a SqlCommand,
    pub shape: ResultShape,
    pub context: &'a CallContext,
}

impl CommandRequest<'_> {
    /// Retention for the result set at zero-based `index`.
    #[must_use]
    pub fn retain_for(&self, index: usize) -> Retain {
        self.shape.retain_for(self.command.window, index)
    }

    /// Whether each result set must keep its first row for output parameters.
    #[must_use]
    pub fn capture_outputs(&self) -> bool {
        self.command.parameters.has_outputs()
    }

    #[must_use]
    pub fn collector(&self, columns: Vec<DataColumn>, index: usize) -> ResultCollector {
        ResultCollector::new(columns, self.retain_for(index), self.capture_outputs())
    }
}

/// Everything a driver produced for one command.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    /// Result sets in the order the statements produced them.
    pub result_sets: Vec<CollectedResult>,
    /// Sum of rows changed by every statement of the command.
    pub rows_affected: u64,
}

/// Opens connections for one database.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Provider served by this connector, when it is one of the built-in ones.
    fn database_type(&self) -> Option<DatabaseType> {
        None
    }

    /// # Errors
    ///
    /// Returns `DriverError` when no connection can be obtained.
    async fn connect(&self) -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// A live connection that runs commands and transaction control statements.
#[async_trait]
pub trait DriverConnection: Send {
    async fn begin(&mut self) -> Result<(), DriverError>;

    async fn commit(&mut self) -> Result<(), DriverError>;

    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// Run every statement of the command and collect its result sets.
    async fn execute(&mut self, request: CommandRequest<'_>) -> Result<Execution, DriverError>;

    /// Release the connection. Called at most once; the connection is dropped afterwards.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Run `work` under the cancellation token and timeout of `context`.
///
/// When either fires first, `abort` is awaited to stop the statement on the server side and
/// `work` is then driven to completion so the connection is idle again. A command that
/// finishes successfully despite the abort keeps its result.
///
/// # Errors
///
/// Returns the error of `work`, or `Cancelled`/`TimedOut` when the abort made it fail.
pub async fn supervise<T, W, A>(context: &CallContext, work: W, abort: A) -> Result<T, DriverError>
where
    W: Future<Output = Result<T, DriverError>>,
    A: Future<Output = ()>,
{
    if context.is_cancelled() {
        return Err(DriverError::Cancelled);
    }
    if context.cancel.is_none() && context.timeout.is_none() {
        return work.await;
    }

    tokio::pin!(work);
    let interrupted = async {
        let cancelled = async {
            match &context.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match context.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            () = cancelled => Interrupt::Cancelled,
            () = expired => Interrupt::TimedOut(context.timeout.unwrap_or(Duration::ZERO)),
        }
    };

    let reason = tokio::select! {
        biased;
        result = &mut work => return result,
        reason = interrupted => reason,
    };
    abort.await;
    match work.await {
        Ok(value) => Ok(value),
        Err(_) => Err(reason.into()),
    }
}

enum Interrupt {
    Cancelled,
    TimedOut(Duration),
}

impl From<Interrupt> for DriverError {
    fn from(reason: Interrupt) -> Self {
        match reason {
            Interrupt::Cancelled => DriverError::Cancelled,
            Interrupt::TimedOut(limit) => DriverError::TimedOut(limit),
        }
    }
}

/// Quote a possibly schema-qualified table name as a SQL identifier.
///
/// ```rust
/// use sql_dac::driver::quote_table_name;
///
/// assert_eq!(quote_table_name("main.users"), r#""main"."users""#);
/// assert_eq!(quote_table_name(r#"od"d"#), r#""od""d""#);
/// ```
#[must_use]
pub fn quote_table_name(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.trim().trim_matches('"').replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}
