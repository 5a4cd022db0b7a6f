//! Convenient imports for common functionality.
//!
//! ```rust
//! use sql_dac::prelude::*;
//! ```

pub use crate::command::{CommandKind, RowWindow, SqlCommand};
pub use crate::config::DacConfig;
pub use crate::connection::{BatchFuture, DbConnection};
pub use crate::database::Database;
pub use crate::error::{DacError, ErrorKind};
pub use crate::params::{ParamRole, Parameter, SqlParameters};
pub use crate::policy::{ExecOptions, ExecutionPolicy};
pub use crate::results::{DataColumn, DataReader, DataRow, DataSet, DataTable};
pub use crate::types::{DatabaseType, DbType, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresConnector, PostgresOptions};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnector, SqliteOptions};
