use std::time::Duration;

use thiserror::Error;

use crate::params::SqlParameters;

/// Boxed error used for causes that do not originate in a database driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fixed messages carried by [`DacError`] variants.
pub mod messages {
    /// Raised when releasing a connection fails.
    pub const SQL_CONNECTION_CLOSE_EXCEPTION: &str = "Exception during SQL connection close.";

    /// Raised when the driver reports an execution error.
    pub const SQL_EXECUTION_EXCEPTION: &str = "SQL execution exception";

    /// Raised for failures that are not recognized as driver errors.
    pub const SYSTEM_EXCEPTION_ON_EXECUTE_SQL_BATCH_LEVEL: &str =
        "System Exception on ExecuteSQLBatch level";

    /// Prefix of the message raised when the status indicator is non-zero.
    pub const SQL_EXECUTION_RETURNED_NON_ZERO_CODE: &str = "SQL execution returned non zero code:";

    /// Prefix of the message raised when `fill_data` receives an unsupported target.
    pub const FILL_DATA_INVALID_TYPE_PASSED: &str = "Invalid type passed to FillData method: ";
}

/// Errors reported by a database driver.
///
/// Every variant except [`DriverError::ParameterError`], [`DriverError::Unsupported`] and
/// [`DriverError::Internal`] is treated as a SQL execution failure by the façade.
#[derive(Debug, Error)]
pub enum DriverError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Unsupported by this provider: {0}")]
    Unsupported(String),

    #[error("Driver worker failure: {0}")]
    Internal(String),

    #[error("Command cancelled")]
    Cancelled,

    #[error("Command timed out after {0:?}")]
    TimedOut(Duration),
}

/// Category of a [`DacError`], used for policy dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Generic,
    SqlExecution,
    NonZeroReturnCode,
    System,
}

/// Errors surfaced by the data-access façade.
///
/// The variants form a narrowing chain: every [`DacError::NonZeroReturnCode`] is also a SQL
/// execution failure, and every SQL execution failure is also a generic failure.
/// [`DacError::System`] sits outside that chain.
#[derive(Debug, Error)]
pub enum DacError {
    /// Library misuse or unsupported state.
    #[error("{message}")]
    Generic {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The driver reported an error while executing, connecting, or closing.
    #[error("{message}")]
    SqlExecution {
        message: String,
        #[source]
        source: Option<DriverError>,
    },

    /// Execution succeeded but the status indicator carried a non-zero value.
    #[error("{}{code}", messages::SQL_EXECUTION_RETURNED_NON_ZERO_CODE)]
    NonZeroReturnCode {
        /// Literal value of the status indicator parameter.
        code: i64,
        /// Output parameter values produced alongside the status.
        returned: SqlParameters,
    },

    /// A failure that did not come from the driver.
    #[error("{message}")]
    System {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

#[derive(Debug, Error)]
#[error("batch logic panicked: {0}")]
struct BatchPanic(String);

impl DacError {
    #[must_use]
    pub fn generic(message: impl Into<String>) -> Self {
        DacError::Generic {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn generic_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DacError::Generic {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Wrap a driver error as a SQL execution failure, regardless of its variant.
    #[must_use]
    pub fn sql(source: DriverError) -> Self {
        DacError::SqlExecution {
            message: messages::SQL_EXECUTION_EXCEPTION.to_string(),
            source: Some(source),
        }
    }

    /// Failure while releasing a connection.
    #[must_use]
    pub fn connection_close(source: DriverError) -> Self {
        DacError::SqlExecution {
            message: messages::SQL_CONNECTION_CLOSE_EXCEPTION.to_string(),
            source: Some(source),
        }
    }

    #[must_use]
    pub fn non_zero_return_code(code: i64, returned: SqlParameters) -> Self {
        DacError::NonZeroReturnCode { code, returned }
    }

    /// Classify an arbitrary error as a system failure.
    #[must_use]
    pub fn system(source: impl Into<BoxError>) -> Self {
        DacError::System {
            message: messages::SYSTEM_EXCEPTION_ON_EXECUTE_SQL_BATCH_LEVEL.to_string(),
            source: Some(source.into()),
        }
    }

    #[must_use]
    pub fn invalid_fill_type(type_name: &str) -> Self {
        DacError::generic(format!(
            "{}{type_name}",
            messages::FILL_DATA_INVALID_TYPE_PASSED
        ))
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let text = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        DacError::system(BatchPanic(text))
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DacError::Generic { .. } => ErrorKind::Generic,
            DacError::SqlExecution { .. } => ErrorKind::SqlExecution,
            DacError::NonZeroReturnCode { .. } => ErrorKind::NonZeroReturnCode,
            DacError::System { .. } => ErrorKind::System,
        }
    }

    /// True for SQL execution failures, including non-zero return codes.
    #[must_use]
    pub fn is_db(&self) -> bool {
        matches!(
            self,
            DacError::SqlExecution { .. } | DacError::NonZeroReturnCode { .. }
        )
    }

    /// True for every variant of the generic chain (generic, SQL, return code).
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.is_system()
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, DacError::System { .. })
    }

    #[must_use]
    pub fn return_code(&self) -> Option<i64> {
        if let DacError::NonZeroReturnCode { code, .. } = self {
            Some(*code)
        } else {
            None
        }
    }

    #[must_use]
    pub fn returned(&self) -> Option<&SqlParameters> {
        if let DacError::NonZeroReturnCode { returned, .. } = self {
            Some(returned)
        } else {
            None
        }
    }

    /// The driver error behind a SQL execution failure, if any.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        if let DacError::SqlExecution { source, .. } = self {
            source.as_ref()
        } else {
            None
        }
    }
}

impl From<DriverError> for DacError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::ParameterError(_) | DriverError::Unsupported(_) => {
                let message = err.to_string();
                DacError::generic_with(message, err)
            }
            DriverError::Internal(_) => DacError::system(err),
            other => DacError::sql(other),
        }
    }
}
