use rusqlite::Statement;
use rusqlite::types::Value;

use crate::driver::{Parameter, RowValues, SqlParameters};
use crate::error::DriverError;

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub(crate) fn to_sqlite_value(value: RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(i),
        RowValues::Float(f) => Value::Real(f),
        RowValues::Text(s) => Value::Text(s),
        RowValues::Bool(b) => Value::Integer(i64::from(b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes),
    }
}

/// Bind every placeholder of `stmt` from `params`.
///
/// Named placeholders take the first parameter with a matching name, whatever its role.
/// Positional placeholders (`?` and `?NNN`) take input parameters in insertion order.
pub(crate) fn bind_parameters(
    stmt: &mut Statement<'_>,
    params: &SqlParameters,
) -> Result<(), DriverError> {
    let inputs: Vec<&Parameter> = params.inputs().collect();
    for idx in 1..=stmt.parameter_count() {
        let name = stmt.parameter_name(idx).map(str::to_owned);
        let param = match name.as_deref() {
            Some(name) if !name.starts_with('?') => params.find(name),
            _ => inputs.get(idx - 1).copied(),
        };
        let Some(param) = param else {
            return Err(DriverError::ParameterError(format!(
                "no value supplied for placeholder {}",
                name.unwrap_or_else(|| format!("?{idx}"))
            )));
        };
        let value = param.bound_value().map_err(DriverError::ParameterError)?;
        stmt.raw_bind_parameter(idx, to_sqlite_value(value))?;
    }
    Ok(())
}
