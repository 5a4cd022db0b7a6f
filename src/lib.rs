//! Data-access façade over SQLite and PostgreSQL.
//!
//! A [`Database`] runs [`SqlCommand`]s and materializes their result sets into
//! [`DataTable`]s, [`DataSet`]s, a [`DataReader`], a scalar, or an affected-row count. Each
//! call takes [`ExecOptions`]; its [`ExecutionPolicy`] decides which failure categories of
//! [`DacError`] reach the caller and which are logged and replaced by an empty result.
//!
//! Caller logic that needs several commands on one connection, optionally inside a
//! transaction, goes through [`Database::execute_batch`] and
//! [`Database::execute_transactional_batch`].
//!
//! ```rust,no_run
//! use sql_dac::prelude::*;
//!
//! # async fn demo() -> Result<(), DacError> {
//! let db = Database::from_config(&DacConfig::new(DatabaseType::Sqlite, "app.db")).await?;
//! let options = ExecOptions::default();
//!
//! db.execute_non_query(&SqlCommand::text("CREATE TABLE IF NOT EXISTS t(v INTEGER)"), &options)
//!     .await?;
//! let inserted = db
//!     .execute_transactional_batch(
//!         |conn| {
//!             Box::pin(async move {
//!                 let mut total = 0;
//!                 for v in 0..3 {
//!                     let insert = SqlCommand::text("INSERT INTO t(v) VALUES (?1)").param("v", v);
//!                     total += conn.execute_non_query(&insert).await?;
//!                 }
//!                 Ok(total)
//!             })
//!         },
//!         &options,
//!     )
//!     .await?;
//! assert_eq!(inserted, 3);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod connection;
pub mod database;
pub mod driver;
pub mod error;
mod materializer;
pub mod params;
pub mod policy;
pub mod prelude;
pub mod results;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use command::{CommandKind, RowWindow, SqlCommand};
pub use config::DacConfig;
pub use connection::{BatchFuture, DbConnection};
pub use database::Database;
pub use error::{DacError, DriverError, ErrorKind};
pub use params::{ParamRole, Parameter, SqlParameters};
pub use policy::{CallContext, ExecOptions, ExecutionPolicy};
pub use results::{DataColumn, DataReader, DataRow, DataSet, DataTable};
pub use types::{DatabaseType, DbType, RowValues};
