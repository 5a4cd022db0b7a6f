use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Values that can be stored in a result row or bound as command parameters.
///
/// The same enum is used by every backend so callers never branch on driver types:
/// ```rust
/// use sql_dac::prelude::*;
///
/// let values = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
///     RowValues::from(Some(2.5)),
/// ];
/// # let _ = values;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    #[default]
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            return parse_timestamp(s);
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Short name of the variant, used in conversion error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "int",
            RowValues::Float(_) => "float",
            RowValues::Text(_) => "text",
            RowValues::Bool(_) => "bool",
            RowValues::Timestamp(_) => "timestamp",
            RowValues::Null => "null",
            RowValues::JSON(_) => "json",
            RowValues::Blob(_) => "blob",
        }
    }

    /// Convert this value to the requested parameter type.
    ///
    /// Null passes through unchanged for every target type.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch when the value cannot represent `target`.
    pub fn coerce(&self, target: DbType) -> Result<RowValues, String> {
        let fail = || format!("cannot convert {} value to {target:?}", self.type_name());
        let coerced = match (target, self) {
            (_, RowValues::Null) => RowValues::Null,
            (DbType::Int, RowValues::Int(i)) => RowValues::Int(*i),
            (DbType::Int, RowValues::Bool(b)) => RowValues::Int(i64::from(*b)),
            (DbType::Int, RowValues::Text(s)) => {
                RowValues::Int(s.trim().parse::<i64>().map_err(|_| fail())?)
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            (DbType::Int, RowValues::Float(f))
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
            {
                RowValues::Int(*f as i64)
            }
            (DbType::Float, v @ (RowValues::Int(_) | RowValues::Float(_))) => {
                RowValues::Float(v.as_float().ok_or_else(fail)?)
            }
            (DbType::Float, RowValues::Text(s)) => {
                RowValues::Float(s.trim().parse::<f64>().map_err(|_| fail())?)
            }
            (DbType::Text, RowValues::Text(s)) => RowValues::Text(s.clone()),
            (DbType::Text, RowValues::Int(i)) => RowValues::Text(i.to_string()),
            (DbType::Text, RowValues::Float(f)) => RowValues::Text(f.to_string()),
            (DbType::Text, RowValues::Bool(b)) => RowValues::Text(b.to_string()),
            (DbType::Text, RowValues::Timestamp(ts)) => {
                RowValues::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            (DbType::Text, RowValues::JSON(j)) => RowValues::Text(j.to_string()),
            (DbType::Bool, v) => RowValues::Bool(*v.as_bool().ok_or_else(fail)?),
            (DbType::Timestamp, v) => RowValues::Timestamp(v.as_timestamp().ok_or_else(fail)?),
            (DbType::Json, RowValues::JSON(j)) => RowValues::JSON(j.clone()),
            (DbType::Json, RowValues::Text(s)) => {
                RowValues::JSON(serde_json::from_str(s).map_err(|e| format!("{}: {e}", fail()))?)
            }
            (DbType::Blob, RowValues::Blob(b)) => RowValues::Blob(b.clone()),
            (DbType::Blob, RowValues::Text(s)) => RowValues::Blob(s.as_bytes().to_vec()),
            _ => return Err(fail()),
        };
        Ok(coerced)
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

impl Serialize for RowValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RowValues::Int(i) => serializer.serialize_i64(*i),
            RowValues::Float(f) => serializer.serialize_f64(*f),
            RowValues::Text(s) => serializer.serialize_str(s),
            RowValues::Bool(b) => serializer.serialize_bool(*b),
            RowValues::Timestamp(ts) => serializer.collect_str(&ts.format("%Y-%m-%d %H:%M:%S%.f")),
            RowValues::Null => serializer.serialize_none(),
            RowValues::JSON(j) => j.serialize(serializer),
            RowValues::Blob(b) => serializer.collect_seq(b),
        }
    }
}

macro_rules! row_value_from {
    ($($ty:ty => $variant:ident via $conv:expr),* $(,)?) => {
        $(
            impl From<$ty> for RowValues {
                fn from(value: $ty) -> Self {
                    RowValues::$variant($conv(value))
                }
            }
        )*
    };
}

row_value_from! {
    i64 => Int via std::convert::identity,
    i32 => Int via i64::from,
    i16 => Int via i64::from,
    u32 => Int via i64::from,
    f64 => Float via std::convert::identity,
    f32 => Float via f64::from,
    bool => Bool via std::convert::identity,
    String => Text via std::convert::identity,
    &str => Text via str::to_string,
    NaiveDateTime => Timestamp via std::convert::identity,
    JsonValue => JSON via std::convert::identity,
    Vec<u8> => Blob via std::convert::identity,
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Explicit parameter type, used to coerce a value before it is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Int,
    Float,
    Text,
    Bool,
    Timestamp,
    Json,
    Blob,
}

/// The database providers this crate can open connections for.
///
/// Both variants always parse so configuration files stay portable; opening a provider whose
/// cargo feature is disabled fails at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `SQLite` database
    #[serde(alias = "sqlite3")]
    Sqlite,
    /// `PostgreSQL` database
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_text_to_int_and_back() {
        assert_eq!(
            RowValues::Text(" 42 ".into()).coerce(DbType::Int),
            Ok(RowValues::Int(42))
        );
        assert_eq!(
            RowValues::Int(7).coerce(DbType::Text),
            Ok(RowValues::Text("7".into()))
        );
        assert!(RowValues::Text("forty".into()).coerce(DbType::Int).is_err());
    }

    #[test]
    fn coerce_float_to_int_rejects_fractions_and_overflow() {
        assert_eq!(RowValues::Float(-3.0).coerce(DbType::Int), Ok(RowValues::Int(-3)));
        assert_eq!(
            RowValues::Float(-9_223_372_036_854_775_808.0).coerce(DbType::Int),
            Ok(RowValues::Int(i64::MIN))
        );
        assert!(RowValues::Float(2.5).coerce(DbType::Int).is_err());
        assert!(RowValues::Float(1e30).coerce(DbType::Int).is_err());
        assert!(RowValues::Float(9_223_372_036_854_775_808.0).coerce(DbType::Int).is_err());
        assert!(RowValues::Float(f64::NAN).coerce(DbType::Int).is_err());
    }

    #[test]
    fn coerce_keeps_null_for_every_target() {
        for target in [DbType::Int, DbType::Bool, DbType::Json, DbType::Blob] {
            assert_eq!(RowValues::Null.coerce(target), Ok(RowValues::Null));
        }
    }

    #[test]
    fn coerce_bool_accepts_zero_and_one() {
        assert_eq!(RowValues::Int(1).coerce(DbType::Bool), Ok(RowValues::Bool(true)));
        assert!(RowValues::Int(5).coerce(DbType::Bool).is_err());
    }

    #[test]
    fn serializes_as_plain_json() -> Result<(), serde_json::Error> {
        let values = vec![
            RowValues::Int(1),
            RowValues::Null,
            RowValues::Text("x".into()),
            RowValues::Bool(false),
        ];
        assert_eq!(serde_json::to_string(&values)?, r#"[1,null,"x",false]"#);
        Ok(())
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(RowValues::from(None::<i64>), RowValues::Null);
        assert_eq!(RowValues::from(Some("a")), RowValues::Text("a".into()));
    }
}
