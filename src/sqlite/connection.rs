use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;

use super::config::{SharedSqliteConnection, SqlitePooledConnection};
use super::query::execute_command;
use crate::driver::{CommandRequest, DriverConnection, Execution, supervise};
use crate::error::DriverError;

const ROLLBACK_BUSY_RETRIES: &[Duration] = &[
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
];

/// Driver connection backed by a bb8 pooled `SQLite` connection.
pub struct SqliteConnection {
    conn: SqlitePooledConnection,
    in_transaction: bool,
}

impl SqliteConnection {
    pub(crate) fn new(conn: SqlitePooledConnection) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    fn conn_handle(&self) -> SharedSqliteConnection {
        Arc::clone(&*self.conn)
    }
}

async fn control(handle: SharedSqliteConnection, sql: &'static str) -> Result<(), DriverError> {
    run_blocking(handle, move |conn| conn.execute_batch(sql).map_err(DriverError::from)).await
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

pub(crate) async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, DriverError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, DriverError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| DriverError::Internal(format!("sqlite spawn_blocking join error: {e}")))?
}

fn rollback_with_busy_retries(conn: &rusqlite::Connection) -> Result<(), DriverError> {
    for (idx, delay) in ROLLBACK_BUSY_RETRIES.iter().copied().enumerate() {
        match conn.execute_batch("ROLLBACK") {
            Ok(()) => return Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    && idx + 1 < ROLLBACK_BUSY_RETRIES.len() =>
            {
                thread::sleep(delay);
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(DriverError::ExecutionError("rollback retries exhausted".into()))
}

#[async_trait]
impl DriverConnection for SqliteConnection {
    async fn begin(&mut self) -> Result<(), DriverError> {
        control(self.conn_handle(), "BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        control(self.conn_handle(), "COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.in_transaction = false;
        run_blocking(self.conn_handle(), |conn| {
            if conn.is_autocommit() {
                // a failed COMMIT or statement may already have ended the transaction
                return Ok(());
            }
            rollback_with_busy_retries(conn)
        })
        .await
    }

    async fn execute(&mut self, request: CommandRequest<'_>) -> Result<Execution, DriverError> {
        let command = request.command.clone();
        let shape = request.shape;
        let handle = self.conn_handle();
        let interrupt = handle.lock().await.get_interrupt_handle();
        let work = run_blocking(handle, move |conn| execute_command(conn, &command, shape));
        supervise(request.context, work, async move { interrupt.interrupt() }).await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let left_open = run_blocking(self.conn_handle(), |conn| {
            if conn.is_autocommit() {
                return Ok(false);
            }
            rollback_with_busy_retries(conn)?;
            Ok(true)
        })
        .await?;
        self.in_transaction = false;
        if left_open {
            return Err(DriverError::ExecutionError(
                "connection released with an open transaction; it was rolled back".into(),
            ));
        }
        Ok(())
    }
}
