//! `PostgreSQL` backend built on `tokio-postgres`.
//!
//! Text commands bind input parameters positionally as `$1`, `$2`, ... in insertion order.
//! Stored procedures are invoked with `CALL name($1, ..)` over every parameter, and the row
//! returned by `CALL` supplies output and status values. A parameterless text command holding
//! several statements runs through the simple query protocol, which returns values as text.

mod config;
mod connection;
mod params;
mod query;

pub use config::{PgManager, PostgresConnector, PostgresOptions};
pub use connection::PostgresConnection;
