//! Scalar value representation for mirror events.
//!
//! Everything that crosses from the producer into the mirror pipeline is
//! pre-serialized to one of the [`MirrorValue`] kinds. The set is closed:
//! no live objects, no nested structures. Structured values travel as
//! JSON-encoded strings and are decoded again only when bound against a
//! `json`/`jsonb` column.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pre-serialized scalar carried by a mirror event.
///
/// Serialized as an adjacently tagged object, e.g.
/// `{"kind": "text", "value": "hello"}` or `{"kind": "null"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MirrorValue {
    /// Plain text
    Text(String),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// Boolean value
    Boolean(bool),

    /// SQL NULL
    Null,

    /// ISO-8601 / RFC 3339 timestamp string
    Timestamp(String),

    /// Plain date string (`YYYY-MM-DD`)
    Date(String),

    /// Arbitrary precision decimal rendered as text
    Decimal(String),

    /// JSON-encoded structured value
    Json(String),
}

impl MirrorValue {
    /// Create a text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for MirrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Timestamp(s) | Self::Date(s) | Self::Decimal(s) | Self::Json(s) => {
                f.write_str(s)
            }
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Null => f.write_str("NULL"),
        }
    }
}

impl From<String> for MirrorValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MirrorValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for MirrorValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for MirrorValue {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for MirrorValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MirrorValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl<T: Into<MirrorValue>> From<Option<T>> for MirrorValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

impl From<DateTime<Utc>> for MirrorValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl From<DateTime<FixedOffset>> for MirrorValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::Timestamp(value.to_rfc3339_opts(SecondsFormat::AutoSi, false))
    }
}

// Naive timestamps are assumed to be UTC, matching how the primary stores them.
impl From<NaiveDateTime> for MirrorValue {
    fn from(value: NaiveDateTime) -> Self {
        value.and_utc().into()
    }
}

impl From<NaiveDate> for MirrorValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value.format("%Y-%m-%d").to_string())
    }
}

impl From<Decimal> for MirrorValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value.normalize().to_string())
    }
}

impl From<serde_json::Value> for MirrorValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                // u64 beyond i64 and all fractional numbers
                None => match n.as_f64() {
                    Some(f) if n.is_f64() => Self::Float(f),
                    _ => Self::Decimal(n.to_string()),
                },
            },
            serde_json::Value::String(s) => Self::Text(s),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Json(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_serialized_form_is_tagged() {
        let value = MirrorValue::text("hello");
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"kind": "text", "value": "hello"})
        );
        assert_eq!(
            serde_json::to_value(MirrorValue::Null).unwrap(),
            json!({"kind": "null"})
        );

        let parsed: MirrorValue =
            serde_json::from_value(json!({"kind": "decimal", "value": "12.50"})).unwrap();
        assert_eq!(parsed, MirrorValue::Decimal("12.50".to_string()));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let parsed: Result<MirrorValue, _> =
            serde_json::from_value(json!({"kind": "object", "value": {}}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_timestamp_conversion() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            MirrorValue::from(ts),
            MirrorValue::Timestamp("2024-03-01T12:30:00Z".to_string())
        );
    }

    #[test]
    fn test_date_and_decimal_conversion() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            MirrorValue::from(date),
            MirrorValue::Date("2024-01-15".to_string())
        );

        let amount = Decimal::from_str("1234.5600").unwrap();
        assert_eq!(
            MirrorValue::from(amount),
            MirrorValue::Decimal("1234.56".to_string())
        );
    }

    #[test]
    fn test_structured_json_becomes_string() {
        let value = MirrorValue::from(json!({"tags": ["a", "b"]}));
        assert_eq!(value, MirrorValue::Json(r#"{"tags":["a","b"]}"#.to_string()));

        let array = MirrorValue::from(json!([1, 2, 3]));
        assert_eq!(array, MirrorValue::Json("[1,2,3]".to_string()));
    }

    #[test]
    fn test_json_scalars_keep_their_kind() {
        assert_eq!(MirrorValue::from(json!(null)), MirrorValue::Null);
        assert_eq!(MirrorValue::from(json!(true)), MirrorValue::Boolean(true));
        assert_eq!(MirrorValue::from(json!(42)), MirrorValue::Integer(42));
        assert_eq!(MirrorValue::from(json!(1.5)), MirrorValue::Float(1.5));
        assert_eq!(MirrorValue::from(json!("x")), MirrorValue::text("x"));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(MirrorValue::from(None::<i64>), MirrorValue::Null);
        assert_eq!(MirrorValue::from(Some("a")), MirrorValue::text("a"));
    }

    #[test]
    fn test_display() {
        assert_eq!(MirrorValue::text("id-1").to_string(), "id-1");
        assert_eq!(MirrorValue::Integer(7).to_string(), "7");
        assert_eq!(MirrorValue::Null.to_string(), "NULL");
    }
}
