//! `SQLite` backend built on `rusqlite`.
//!
//! Connections are pooled with `bb8` and every statement runs on the blocking thread pool.
//! Parameters bind by name (`@id`, `:id`, `$id`) or by position (`?`, `?2`).
//!
//! Output parameters are read from the last result set of the command, so a command that
//! reports a status ends with a row such as `SELECT 0 AS ret`. Stored procedures are not
//! supported by `SQLite`.

mod config;
mod connection;
mod params;
mod query;

pub use config::{
    SharedSqliteConnection, SqliteConnector, SqliteManager, SqliteOptions, SqliteOptionsBuilder,
    SqlitePooledConnection,
};
pub use connection::SqliteConnection;
