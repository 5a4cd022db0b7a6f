use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, Row, Statement};

use super::params::bind_parameters;
use crate::driver::{
    CommandKind, DataColumn, Execution, ResultCollector, ResultShape, RowValues, SqlCommand,
    quote_table_name,
};
use crate::error::DriverError;

/// Extract a `RowValues` from a `SQLite` row.
pub(crate) fn extract_value(row: &Row<'_>, idx: usize) -> Result<RowValues, DriverError> {
    let value = match row.get_ref(idx)? {
        ValueRef::Null => RowValues::Null,
        ValueRef::Integer(i) => RowValues::Int(i),
        ValueRef::Real(f) => RowValues::Float(f),
        ValueRef::Text(bytes) => RowValues::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => RowValues::Blob(bytes.to_vec()),
    };
    Ok(value)
}

fn describe_columns(stmt: &Statement<'_>) -> Vec<DataColumn> {
    stmt.columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| {
            DataColumn::new(col.name(), ordinal, col.decl_type().map(str::to_owned))
        })
        .collect()
}

/// The SQL actually sent for `command`.
pub(crate) fn render_sql(command: &SqlCommand) -> Result<String, DriverError> {
    match command.kind {
        CommandKind::Text => Ok(command.sql.clone()),
        CommandKind::TableDirect => Ok(format!("SELECT * FROM {}", quote_table_name(&command.sql))),
        CommandKind::StoredProcedure => Err(DriverError::Unsupported(format!(
            "sqlite has no stored procedures (requested `{}`)",
            command.sql
        ))),
    }
}

/// Run every statement of `command` in order and collect the result sets.
///
/// Statements without result columns add to the affected row count when they changed rows;
/// DDL leaves `changes()` at the previous DML count and is skipped. Each statement that
/// returns columns is stepped at least once, so DML with `RETURNING` always takes effect.
pub(crate) fn execute_command(
    conn: &Connection,
    command: &SqlCommand,
    shape: ResultShape,
) -> Result<Execution, DriverError> {
    let sql = render_sql(command)?;
    let keep_head = command.parameters.has_outputs();
    let mut execution = Execution::default();
    let mut batch = Batch::new(conn, &sql);

    while let Some(mut stmt) = batch.next()? {
        bind_parameters(&mut stmt, &command.parameters)?;
        if stmt.column_count() == 0 {
            let before = conn.total_changes();
            stmt.raw_execute()?;
            if conn.total_changes() != before {
                execution.rows_affected += conn.changes();
            }
            continue;
        }

        let columns = describe_columns(&stmt);
        let width = columns.len();
        let index = execution.result_sets.len();
        let readonly = stmt.readonly();
        let mut collector =
            ResultCollector::new(columns, shape.retain_for(command.window, index), keep_head);
        {
            let mut rows = stmt.raw_query();
            while let Some(row) = rows.next()? {
                let more = collector.offer(|| (0..width).map(|i| extract_value(row, i)).collect())?;
                if !more {
                    break;
                }
            }
        }
        if !readonly {
            execution.rows_affected += conn.changes();
        }
        execution.result_sets.push(collector.finish());
    }
    Ok(execution)
}
