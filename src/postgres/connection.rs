use std::fmt;

use async_trait::async_trait;
use bb8::PooledConnection;
use tokio_postgres::{Client, NoTls};
use tracing::warn;

use super::config::PgManager;
use super::query::execute_command;
use crate::driver::{CommandRequest, DriverConnection, Execution, supervise};
use crate::error::DriverError;

/// Driver connection backed by a bb8 pooled Postgres client.
pub struct PostgresConnection {
    conn: PooledConnection<'static, PgManager>,
    in_transaction: bool,
}

impl PostgresConnection {
    pub(crate) fn new(conn: PooledConnection<'static, PgManager>) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    fn client(&self) -> &Client {
        &self.conn
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DriverConnection for PostgresConnection {
    async fn begin(&mut self) -> Result<(), DriverError> {
        self.client().batch_execute("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.client().batch_execute("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.in_transaction = false;
        self.client().batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn execute(&mut self, request: CommandRequest<'_>) -> Result<Execution, DriverError> {
        let client = self.client();
        let token = client.cancel_token();
        let abort = async move {
            if let Err(e) = token.cancel_query(NoTls).await {
                warn!(error = %e, "postgres cancel request failed");
            }
        };
        let work = execute_command(client, request.command, request.shape);
        supervise(request.context, work, abort).await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.client().is_closed() {
            return Err(DriverError::ConnectionError(
                "postgres connection was lost before release".into(),
            ));
        }
        if self.in_transaction {
            self.in_transaction = false;
            self.client().batch_execute("ROLLBACK").await?;
            return Err(DriverError::ExecutionError(
                "connection released with an open transaction; it was rolled back".into(),
            ));
        }
        Ok(())
    }
}
