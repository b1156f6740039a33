use chrono::{DateTime, Duration, DurationRound, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

use crate::value::{round_to, Value};

/// Declared type of a field, which doubles as its cast rule
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Text,
    Integer,
    /// Floating decimal, rounded to `scale` places on write when a scale is given
    Decimal {
        scale: Option<u32>,
    },
    Boolean,
    DateTime,
    Date,
    Json,
    /// Text restricted to a fixed set of values (status columns)
    Enum {
        variants: Vec<String>,
    },
}

impl FieldType {
    /// Parse a cast declaration such as `"string"`, `"decimal:2"` or `"enum:draft,published"`
    ///
    /// Returns `None` for names that are not a known cast.
    pub fn parse(decl: &str) -> Option<FieldType> {
        let decl = decl.trim();
        let (head, arg) = match decl.split_once(':') {
            Some((h, a)) => (h.trim(), Some(a.trim())),
            None => (decl, None),
        };

        let ty = match (head.to_ascii_lowercase().as_str(), arg) {
            ("string" | "text", None) => FieldType::Text,
            ("integer" | "int", None) => FieldType::Integer,
            ("decimal", None) | ("float" | "double" | "real", None) => {
                FieldType::Decimal { scale: None }
            }
            ("decimal", Some(scale)) => FieldType::Decimal {
                scale: Some(scale.parse().ok()?),
            },
            ("boolean" | "bool", None) => FieldType::Boolean,
            ("datetime" | "timestamp", None) => FieldType::DateTime,
            ("date", None) => FieldType::Date,
            ("json" | "array" | "object" | "collection", None) => FieldType::Json,
            ("enum", Some(list)) => {
                let variants: Vec<String> = list
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                if variants.is_empty() {
                    return None;
                }
                FieldType::Enum { variants }
            }
            _ => return None,
        };
        Some(ty)
    }

    pub fn enumeration(variants: &[&str]) -> FieldType {
        FieldType::Enum {
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Human-readable name used in error messages and CLI listings
    pub fn name(&self) -> String {
        match self {
            FieldType::Text => "string".to_string(),
            FieldType::Integer => "integer".to_string(),
            FieldType::Decimal { scale: Some(s) } => format!("decimal:{}", s),
            FieldType::Decimal { scale: None } => "decimal".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::DateTime => "datetime".to_string(),
            FieldType::Date => "date".to_string(),
            FieldType::Json => "json".to_string(),
            FieldType::Enum { variants } => format!("enum:{}", variants.join(",")),
        }
    }

    /// Apply the cast to an incoming value
    ///
    /// `Null` always passes; nullability is the caller's concern. The error
    /// string explains why the value was refused.
    pub fn cast(&self, value: Value) -> std::result::Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            FieldType::Text => cast_text(value).map(Value::Text),
            FieldType::Integer => cast_integer(value).map(Value::Integer),
            FieldType::Decimal { scale } => {
                let d = cast_decimal(value)?;
                Ok(Value::Decimal(match scale {
                    Some(s) => round_to(d, *s),
                    None => d,
                }))
            }
            FieldType::Boolean => cast_boolean(value).map(Value::Boolean),
            FieldType::DateTime => cast_datetime(value).map(Value::DateTime),
            FieldType::Date => cast_date(value).map(Value::Date),
            FieldType::Json => Ok(Value::Json(match value {
                Value::Json(v) => v,
                other => other.to_json(),
            })),
            FieldType::Enum { variants } => {
                let text = cast_text(value)?;
                if variants.iter().any(|v| *v == text) {
                    Ok(Value::Text(text))
                } else {
                    Err(format!(
                        "'{}' is not one of [{}]",
                        text,
                        variants.join(", ")
                    ))
                }
            }
        }
    }
}

fn cast_text(value: Value) -> std::result::Result<String, String> {
    match value {
        Value::Text(s) => Ok(s),
        Value::Json(JsonValue::String(s)) => Ok(s),
        Value::Json(v) => Ok(v.to_string()),
        other => match other.to_json() {
            JsonValue::String(s) => Ok(s),
            v => Ok(v.to_string()),
        },
    }
}

// -2^63 and 2^63 are exact in f64; the range check also rejects NaN
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn cast_integer(value: Value) -> std::result::Result<i64, String> {
    match value {
        Value::Integer(i) => Ok(i),
        Value::Boolean(b) => Ok(i64::from(b)),
        Value::Decimal(d) if !(I64_LOWER..I64_UPPER).contains(&d) => {
            Err(format!("{} is out of integer range", d))
        }
        Value::Decimal(d) if d.fract() == 0.0 => Ok(d as i64),
        Value::Decimal(d) => Err(format!("{} has a fractional part", d)),
        Value::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not an integer", s)),
        other => Err(format!("{} is not an integer", other.kind_name())),
    }
}

fn cast_decimal(value: Value) -> std::result::Result<f64, String> {
    let d = match value {
        Value::Decimal(d) => d,
        Value::Integer(i) => i as f64,
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", s))?,
        other => return Err(format!("{} is not a number", other.kind_name())),
    };
    if d.is_finite() {
        Ok(d)
    } else {
        Err("non-finite number".to_string())
    }
}

fn cast_boolean(value: Value) -> std::result::Result<bool, String> {
    match value {
        Value::Boolean(b) => Ok(b),
        Value::Integer(0) => Ok(false),
        Value::Integer(1) => Ok(true),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" | "" => Ok(false),
            _ => Err(format!("'{}' is not a boolean", s)),
        },
        other => Err(format!("{} is not a boolean", other.kind_name())),
    }
}

/// Date-times are kept at millisecond precision, the resolution of storage
fn cast_datetime(value: Value) -> std::result::Result<DateTime<Utc>, String> {
    let dt = match value {
        Value::DateTime(dt) => dt,
        Value::Date(d) => d.and_time(chrono::NaiveTime::MIN).and_utc(),
        Value::Text(s) => {
            parse_datetime(&s).ok_or_else(|| format!("'{}' is not a date-time", s))?
        }
        other => return Err(format!("{} is not a date-time", other.kind_name())),
    };
    dt.duration_trunc(Duration::milliseconds(1))
        .map_err(|e| format!("{} cannot be stored: {}", dt, e))
}

fn cast_date(value: Value) -> std::result::Result<NaiveDate, String> {
    match value {
        Value::Date(d) => Ok(d),
        Value::DateTime(dt) => Ok(dt.date_naive()),
        Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .or_else(|| parse_datetime(&s).map(|dt| dt.date_naive()))
            .ok_or_else(|| format!("'{}' is not a date", s)),
        other => Err(format!("{} is not a date", other.kind_name())),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (read as UTC) and bare dates
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// A declared column of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub nullable: bool,
    pub default: Option<Value>,
    pub unique: bool,
    /// Omitted from serialized output (secrets, tokens)
    pub hidden: bool,
    /// Maintained by lifecycle hooks; never mass-assignable
    pub counter: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            default: None,
            unique: false,
            hidden: false,
            counter: false,
        }
    }

    pub fn counter(name: impl Into<String>) -> Self {
        Self {
            nullable: false,
            default: Some(Value::Integer(0)),
            counter: true,
            ..Self::new(name, FieldType::Integer)
        }
    }

    /// Value a create must supply when the caller did not
    pub fn is_required(&self) -> bool {
        !self.nullable && self.default.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_known_casts() {
        assert_eq!(FieldType::parse("string"), Some(FieldType::Text));
        assert_eq!(FieldType::parse("INT"), Some(FieldType::Integer));
        assert_eq!(
            FieldType::parse("decimal:2"),
            Some(FieldType::Decimal { scale: Some(2) })
        );
        assert_eq!(FieldType::parse("array"), Some(FieldType::Json));
        assert_eq!(
            FieldType::parse("enum:draft, published"),
            Some(FieldType::enumeration(&["draft", "published"]))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_casts() {
        assert_eq!(FieldType::parse("uri"), None);
        assert_eq!(FieldType::parse("decimal:x"), None);
        assert_eq!(FieldType::parse("enum:"), None);
        assert_eq!(FieldType::parse("string:5"), None);
    }

    #[test]
    fn test_decimal_cast_rounds_to_scale() {
        let ty = FieldType::Decimal { scale: Some(2) };
        assert_eq!(ty.cast(Value::Text("10.129".into())), Ok(Value::Decimal(10.13)));
        assert_eq!(ty.cast(Value::Integer(5)), Ok(Value::Decimal(5.0)));
        assert!(ty.cast(Value::Text("ten".into())).is_err());
    }

    #[test]
    fn test_boolean_cast() {
        let ty = FieldType::Boolean;
        assert_eq!(ty.cast(Value::Integer(1)), Ok(Value::Boolean(true)));
        assert_eq!(ty.cast(Value::Text("No".into())), Ok(Value::Boolean(false)));
        assert!(ty.cast(Value::Integer(7)).is_err());
    }

    #[test]
    fn test_integer_cast_rejects_out_of_range_decimals() {
        let ty = FieldType::Integer;
        assert_eq!(ty.cast(Value::Decimal(42.0)), Ok(Value::Integer(42)));
        assert_eq!(
            ty.cast(Value::Decimal(-9_223_372_036_854_775_808.0)),
            Ok(Value::Integer(i64::MIN))
        );
        assert!(ty.cast(Value::Decimal(9_223_372_036_854_775_808.0)).is_err());
        assert!(ty.cast(Value::Decimal(1e300)).is_err());
        assert!(ty.cast(Value::Decimal(f64::NAN)).is_err());
        assert!(ty.cast(Value::Decimal(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_datetime_cast_accepts_common_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 4, 9, 15, 0).unwrap();
        for input in ["2025-03-04T09:15:00Z", "2025-03-04 09:15:00", "2025-03-04T11:15:00+02:00"] {
            assert_eq!(
                FieldType::DateTime.cast(Value::Text(input.into())),
                Ok(Value::DateTime(expected)),
                "input {}",
                input
            );
        }
        assert!(FieldType::DateTime.cast(Value::Text("soon".into())).is_err());
    }

    #[test]
    fn test_datetime_cast_truncates_to_milliseconds() {
        let expected =
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(1);
        assert_eq!(
            FieldType::DateTime.cast(Value::Text("2025-01-01T00:00:00.001500Z".into())),
            Ok(Value::DateTime(expected))
        );

        let precise = expected + Duration::nanoseconds(999_999);
        assert_eq!(
            FieldType::DateTime.cast(Value::DateTime(precise)),
            Ok(Value::DateTime(expected))
        );
    }

    #[test]
    fn test_json_cast_wraps_scalars() {
        assert_eq!(
            FieldType::Json.cast(Value::Text("plain".into())),
            Ok(Value::Json(json!("plain")))
        );
        assert_eq!(
            FieldType::Json.cast(Value::Json(json!({"a": 1}))),
            Ok(Value::Json(json!({"a": 1})))
        );
    }

    #[test]
    fn test_enum_cast_checks_membership() {
        let ty = FieldType::enumeration(&["pending", "approved"]);
        assert_eq!(ty.cast(Value::from("pending")), Ok(Value::from("pending")));
        assert!(ty.cast(Value::from("archived")).is_err());
    }

    #[test]
    fn test_integer_cast_refuses_fractions() {
        assert_eq!(FieldType::Integer.cast(Value::Decimal(4.0)), Ok(Value::Integer(4)));
        assert!(FieldType::Integer.cast(Value::Decimal(4.5)).is_err());
        assert_eq!(FieldType::Integer.cast(Value::Null), Ok(Value::Null));
    }
}
