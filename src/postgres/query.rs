use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::{TryStreamExt, pin_mut};
use serde_json::Value;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row, SimpleQueryMessage};

use crate::driver::{
    CommandKind, DataColumn, Execution, ResultCollector, ResultShape, RowValues, SqlCommand,
    quote_table_name,
};
use crate::error::DriverError;

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
pub(crate) fn extract_value(row: &Row, idx: usize) -> Result<RowValues, DriverError> {
    let type_info = row.columns()[idx].type_();
    let value = match type_info.name() {
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(RowValues::Null, RowValues::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Float(f64::from(v))),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(RowValues::Null, RowValues::Float),
        "bool" => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(RowValues::Null, RowValues::Bool),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(RowValues::Null, RowValues::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Timestamp(v.naive_utc())),
        "date" => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map_or(RowValues::Null, |v| {
                RowValues::Timestamp(v.and_time(chrono::NaiveTime::MIN))
            }),
        "json" | "jsonb" => row
            .try_get::<_, Option<Value>>(idx)?
            .map_or(RowValues::Null, RowValues::JSON),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map_or(RowValues::Null, RowValues::Blob),
        other => match row.try_get::<_, Option<String>>(idx) {
            Ok(val) => val.map_or(RowValues::Null, RowValues::Text),
            Err(_) => {
                return Err(DriverError::ExecutionError(format!(
                    "unsupported postgres column type `{other}` at index {idx}"
                )));
            }
        },
    };
    Ok(value)
}

/// SQL text and bound values for `command`.
fn render(command: &SqlCommand) -> Result<(String, Vec<RowValues>), DriverError> {
    match command.kind {
        CommandKind::Text => {
            let binds = command
                .parameters
                .inputs()
                .map(|p| p.bound_value().map_err(DriverError::ParameterError))
                .collect::<Result<_, _>>()?;
            Ok((command.sql.clone(), binds))
        }
        CommandKind::TableDirect => Ok((
            format!("SELECT * FROM {}", quote_table_name(&command.sql)),
            Vec::new(),
        )),
        CommandKind::StoredProcedure => {
            let binds = command
                .parameters
                .iter()
                .map(|p| p.bound_value().map_err(DriverError::ParameterError))
                .collect::<Result<Vec<_>, _>>()?;
            let placeholders = (1..=binds.len())
                .map(|i| format!("${i}"))
                .collect::<Vec<_>>()
                .join(", ");
            Ok((
                format!("CALL {}({placeholders})", quote_table_name(&command.sql)),
                binds,
            ))
        }
    }
}

fn is_multi_statement(sql: &str) -> bool {
    statement_count(sql) > 1
}

/// Non-empty statements in `sql`. A `;` inside a string literal, quoted identifier,
/// comment or dollar-quoted body does not end a statement.
fn statement_count(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut count = 0;
    let mut pending = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => {
                count += usize::from(pending);
                pending = false;
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map_or(bytes.len(), |n| i + n);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            c if c.is_ascii_whitespace() => i += 1,
            b'\'' => {
                i = skip_quoted(bytes, i, b'\'', escape_string_prefix(bytes, i));
                pending = true;
            }
            b'"' => {
                i = skip_quoted(bytes, i, b'"', false);
                pending = true;
            }
            b'$' => {
                i = skip_dollar_quoted(sql, i).unwrap_or(i + 1);
                pending = true;
            }
            _ => {
                i += 1;
                pending = true;
            }
        }
    }
    count + usize::from(pending)
}

/// `E'...'` strings take backslash escapes.
fn escape_string_prefix(bytes: &[u8], quote: usize) -> bool {
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    match quote.checked_sub(1).map(|p| bytes[p]) {
        Some(b'E' | b'e') => quote < 2 || !is_ident(bytes[quote - 2]),
        _ => false,
    }
}

fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash: bool) -> usize {
    let mut j = start + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' if backslash => j += 2,
            b if b == quote && bytes.get(j + 1) == Some(&quote) => j += 2,
            b if b == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut j = start;
    while j + 1 < bytes.len() {
        match &bytes[j..j + 2] {
            b"/*" => {
                depth += 1;
                j += 2;
            }
            b"*/" => {
                depth -= 1;
                j += 2;
                if depth == 0 {
                    return j;
                }
            }
            _ => j += 1,
        }
    }
    bytes.len()
}

/// End of a `$tag$ ... $tag$` body starting at `start`, or `None` when the `$` opens no
/// dollar quote (for example a `$1` placeholder).
fn skip_dollar_quoted(sql: &str, start: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    let tag_len = bytes[start + 1..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    let close = start + 1 + tag_len;
    if bytes.get(close) != Some(&b'$') || bytes.get(start + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let tag = &sql[start..=close];
    Some(
        sql[close + 1..]
            .find(tag)
            .map_or(bytes.len(), |pos| close + 1 + pos + tag.len()),
    )
}

/// Run `command` and collect its result sets.
pub(crate) async fn execute_command(
    client: &Client,
    command: &SqlCommand,
    shape: ResultShape,
) -> Result<Execution, DriverError> {
    let (sql, binds) = render(command)?;
    if command.kind == CommandKind::Text && binds.is_empty() && is_multi_statement(&sql) {
        return execute_simple(client, &sql, command, shape).await;
    }

    let stmt = client.prepare(&sql).await?;
    let refs: Vec<&(dyn ToSql + Sync)> = binds.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
    let mut execution = Execution::default();
    if stmt.columns().is_empty() {
        execution.rows_affected = client.execute(&stmt, &refs).await?;
        return Ok(execution);
    }

    let columns: Vec<DataColumn> = stmt
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| {
            DataColumn::new(col.name(), ordinal, Some(col.type_().name().to_string()))
        })
        .collect();
    let width = columns.len();
    let mut collector = ResultCollector::new(
        columns,
        shape.retain_for(command.window, 0),
        command.parameters.has_outputs(),
    );

    let stream = client.query_raw(&stmt, refs.iter().copied()).await?;
    pin_mut!(stream);
    while let Some(row) = stream.try_next().await? {
        if !collector.offer(|| (0..width).map(|i| extract_value(&row, i)).collect())? {
            break;
        }
    }
    // the command tag arrives after the last row
    while stream.try_next().await?.is_some() {}
    execution.rows_affected = stream.rows_affected().unwrap_or(0);
    execution.result_sets.push(collector.finish());
    Ok(execution)
}

/// Several statements through the simple query protocol. Every value arrives as text.
async fn execute_simple(
    client: &Client,
    sql: &str,
    command: &SqlCommand,
    shape: ResultShape,
) -> Result<Execution, DriverError> {
    let keep_head = command.parameters.has_outputs();
    let mut execution = Execution::default();
    let mut current: Option<(ResultCollector, bool)> = None;

    for message in client.simple_query(sql).await? {
        match message {
            SimpleQueryMessage::RowDescription(described) => {
                let columns = described
                    .iter()
                    .enumerate()
                    .map(|(ordinal, col)| DataColumn::new(col.name(), ordinal, None))
                    .collect();
                let retain = shape.retain_for(command.window, execution.result_sets.len());
                current = Some((ResultCollector::new(columns, retain, keep_head), true));
            }
            SimpleQueryMessage::Row(row) => {
                let (collector, open) = current.get_or_insert_with(|| {
                    let columns = row
                        .columns()
                        .iter()
                        .enumerate()
                        .map(|(ordinal, col)| DataColumn::new(col.name(), ordinal, None))
                        .collect();
                    let index = execution.result_sets.len();
                    let retain = shape.retain_for(command.window, index);
                    (ResultCollector::new(columns, retain, keep_head), true)
                });
                if *open {
                    *open = collector.offer(|| {
                        Ok((0..row.len())
                            .map(|i| row.get(i).map_or(RowValues::Null, |s| RowValues::Text(s.to_string())))
                            .collect())
                    })?;
                }
            }
            SimpleQueryMessage::CommandComplete(rows) => match current.take() {
                Some((collector, _)) => execution.result_sets.push(collector.finish()),
                None => execution.rows_affected += rows,
            },
            _ => {}
        }
    }
    Ok(execution)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_procedure_calls_with_every_parameter() -> Result<(), DriverError> {
        let mut command = SqlCommand::stored_procedure("app.transfer").param("@amount", 5);
        command.parameters.add_status("@ret");
        let (sql, binds) = render(&command)?;
        assert_eq!(sql, r#"CALL "app"."transfer"($1, $2)"#);
        assert_eq!(binds, [RowValues::Int(5), RowValues::Null]);
        Ok(())
    }

    #[test]
    fn multi_statement_detection_ignores_trailing_semicolon() {
        assert!(!is_multi_statement("SELECT 1;"));
        assert!(is_multi_statement("SELECT 1; SELECT 2"));
    }

    #[test]
    fn semicolons_inside_literals_and_comments_do_not_split() {
        assert!(!is_multi_statement("SELECT 1 AS n, 'a;b' AS s"));
        assert!(!is_multi_statement("SELECT 'it''s; fine', \"odd;name\" FROM t"));
        assert!(!is_multi_statement("SELECT E'\\'; still text' -- trailing; note"));
        assert!(!is_multi_statement("SELECT /* a; /* nested; */ b; */ 1"));
        assert!(!is_multi_statement("DO $body$ BEGIN PERFORM 1; END $body$"));
        assert!(!is_multi_statement("SELECT $$x;y$$, $1::int"));
        assert!(!is_multi_statement("SELECT 1; -- done"));
        assert!(is_multi_statement("SELECT 'a;b'; SELECT $t$;$t$"));
    }
}
