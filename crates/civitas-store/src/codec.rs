//! Column encodings
//!
//! Date-times are stored as INTEGER epoch milliseconds, dates as ISO TEXT,
//! JSON as TEXT, booleans as 0/1 and decimals as REAL.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use civitas_core::errors::{ExError, ExErrorKind};
use civitas_core::{FieldType, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::errors::Result;

pub fn datetime_to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Encode a typed value for binding
pub fn encode(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Decimal(d) => SqlValue::Real(*d),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::DateTime(dt) => SqlValue::Integer(datetime_to_millis(*dt)),
        Value::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::Json(v) => SqlValue::Text(v.to_string()),
    }
}

/// Render a value as a SQL literal (column defaults in generated DDL)
pub fn literal(value: &Value) -> String {
    match encode(value) {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(r) => format!("{:?}", r),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        SqlValue::Blob(b) => format!("X'{}'", hex::encode(b)),
    }
}

/// Decode a stored column according to its declared type
pub fn decode(ty: &FieldType, raw: ValueRef<'_>) -> Result<Value> {
    let value = match (ty, raw) {
        (_, ValueRef::Null) => Value::Null,
        (FieldType::Text | FieldType::Enum { .. }, ValueRef::Text(t)) => {
            Value::Text(utf8(t)?.to_string())
        }
        (FieldType::Integer, ValueRef::Integer(i)) => Value::Integer(i),
        (FieldType::Decimal { .. }, ValueRef::Real(r)) => Value::Decimal(r),
        (FieldType::Decimal { .. }, ValueRef::Integer(i)) => Value::Decimal(i as f64),
        (FieldType::Boolean, ValueRef::Integer(i)) => Value::Boolean(i != 0),
        (FieldType::DateTime, ValueRef::Integer(ms)) => Value::DateTime(
            millis_to_datetime(ms)
                .ok_or_else(|| decode_error(format!("timestamp {} out of range", ms)))?,
        ),
        (FieldType::Date, ValueRef::Text(t)) => {
            let text = utf8(t)?;
            Value::Date(
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|e| decode_error(format!("bad date '{}': {}", text, e)))?,
            )
        }
        (FieldType::Json, ValueRef::Text(t)) => Value::Json(
            serde_json::from_str(utf8(t)?)
                .map_err(|e| decode_error(format!("bad json: {}", e)))?,
        ),
        (ty, other) => {
            return Err(decode_error(format!(
                "stored {:?} does not match declared type {}",
                other.data_type(),
                ty.name()
            )))
        }
    };
    Ok(value)
}

/// Decode a nullable timestamp column
pub fn decode_timestamp(raw: ValueRef<'_>) -> Result<Option<DateTime<Utc>>> {
    match decode(&FieldType::DateTime, raw)? {
        Value::DateTime(dt) => Ok(Some(dt)),
        _ => Ok(None),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| decode_error(e.to_string()))
}

fn decode_error(message: String) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("decode")
        .with_message(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_datetime_stored_as_millis() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let encoded = encode(&Value::DateTime(dt));
        assert_eq!(encoded, SqlValue::Integer(dt.timestamp_millis()));

        let decoded = decode(&FieldType::DateTime, ValueRef::Integer(dt.timestamp_millis()))
            .unwrap();
        assert_eq!(decoded, Value::DateTime(dt));
    }

    #[test]
    fn test_boolean_and_json_decoding() {
        assert_eq!(
            decode(&FieldType::Boolean, ValueRef::Integer(1)).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            decode(&FieldType::Json, ValueRef::Text(b"[\"a\",2]")).unwrap(),
            Value::Json(json!(["a", 2]))
        );
    }

    #[test]
    fn test_decimal_accepts_integer_storage() {
        assert_eq!(
            decode(&FieldType::Decimal { scale: Some(2) }, ValueRef::Integer(3)).unwrap(),
            Value::Decimal(3.0)
        );
    }

    #[test]
    fn test_type_mismatch_is_serialization_error() {
        let err = decode(&FieldType::Integer, ValueRef::Text(b"seven")).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Serialization);
    }

    #[test]
    fn test_literal_escapes_quotes() {
        assert_eq!(literal(&Value::from("o'neil")), "'o''neil'");
        assert_eq!(literal(&Value::Boolean(false)), "0");
        assert_eq!(literal(&Value::Json(json!([]))), "'[]'");
        assert_eq!(literal(&Value::Decimal(1.5)), "1.5");
    }
}
