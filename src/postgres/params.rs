use std::error::Error;

use chrono::{TimeZone, Utc};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::driver::RowValues;

type BoxedError = Box<dyn Error + Sync + Send>;

/// Encode a value for the parameter type the server inferred.
///
/// Integers narrow to `int2`/`int4` when they fit, text parses into numeric, boolean and
/// JSON targets, and timestamps widen to `timestamptz` (as UTC) or narrow to `date`.
/// Any other combination fails with the driver's wrong-type error.
impl ToSql for RowValues {
    fn to_sql(&self, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxedError> {
        match (self, ty) {
            (RowValues::Null, _) => Ok(IsNull::Yes),
            (RowValues::Int(i), &Type::INT2) => i16::try_from(*i)?.to_sql_checked(ty, out),
            (RowValues::Int(i), &Type::INT4) => i32::try_from(*i)?.to_sql_checked(ty, out),
            #[allow(clippy::cast_precision_loss)]
            (RowValues::Int(i), &Type::FLOAT4 | &Type::FLOAT8) => {
                (*i as f64).to_sql_checked(ty, out)
            }
            (RowValues::Int(i), _) => i.to_sql_checked(ty, out),
            #[allow(clippy::cast_possible_truncation)]
            (RowValues::Float(f), &Type::FLOAT4) => (*f as f32).to_sql_checked(ty, out),
            (RowValues::Float(f), _) => f.to_sql_checked(ty, out),
            (RowValues::Text(s), &Type::INT2 | &Type::INT4 | &Type::INT8) => {
                RowValues::Int(s.trim().parse()?).to_sql(ty, out)
            }
            (RowValues::Text(s), &Type::FLOAT4 | &Type::FLOAT8) => {
                RowValues::Float(s.trim().parse()?).to_sql(ty, out)
            }
            (RowValues::Text(s), &Type::BOOL) => s.trim().parse::<bool>()?.to_sql_checked(ty, out),
            (RowValues::Text(s), &Type::JSON | &Type::JSONB) => {
                serde_json::from_str::<serde_json::Value>(s)?.to_sql_checked(ty, out)
            }
            (RowValues::Text(s), _) => s.to_sql_checked(ty, out),
            (RowValues::Bool(b), &Type::INT2 | &Type::INT4 | &Type::INT8) => {
                RowValues::Int(i64::from(*b)).to_sql(ty, out)
            }
            (RowValues::Bool(b), _) => b.to_sql_checked(ty, out),
            (RowValues::Timestamp(dt), &Type::TIMESTAMPTZ) => {
                Utc.from_utc_datetime(dt).to_sql_checked(ty, out)
            }
            (RowValues::Timestamp(dt), &Type::DATE) => dt.date().to_sql_checked(ty, out),
            (RowValues::Timestamp(dt), _) => dt.to_sql_checked(ty, out),
            (RowValues::JSON(jsval), _) => jsval.to_sql_checked(ty, out),
            (RowValues::Blob(blob), _) => blob.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // each arm of to_sql checks the concrete type itself
        true
    }

    to_sql_checked!();
}
