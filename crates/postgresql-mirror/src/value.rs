//! Binding mirror scalars as PostgreSQL parameters.
//!
//! The mirror has no schema knowledge, so a [`MirrorValue`] is encoded against
//! whatever type the server inferred for its placeholder: a text id bound to a
//! `uuid` column is parsed as a UUID, a decimal string bound to `numeric`
//! becomes a `Decimal`, a JSON string bound to `jsonb` is decoded first, and
//! so on. Combinations that cannot be converted surface as driver errors.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use mirror_core::MirrorValue;
use rust_decimal::Decimal;
use std::error::Error;
use std::str::FromStr;
use tokio_postgres::types::{to_sql_checked, IsNull, Kind, ToSql, Type};
use uuid::Uuid;

type EncodeResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

/// Borrowed [`MirrorValue`] that implements [`ToSql`] for any column type.
#[derive(Debug, Clone, Copy)]
pub struct SqlValue<'a>(pub &'a MirrorValue);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> EncodeResult {
        match self.0 {
            MirrorValue::Null => Ok(IsNull::Yes),
            MirrorValue::Boolean(b) => encode_bool(*b, ty, out),
            MirrorValue::Integer(i) => encode_integer(*i, ty, out),
            MirrorValue::Float(f) => encode_float(*f, ty, out),
            MirrorValue::Text(s)
            | MirrorValue::Timestamp(s)
            | MirrorValue::Date(s)
            | MirrorValue::Decimal(s)
            | MirrorValue::Json(s) => encode_text(s, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn encode_bool(value: bool, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::BOOL => value.to_sql(ty, out),
        _ => encode_text(if value { "true" } else { "false" }, ty, out),
    }
}

fn encode_integer(value: i64, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql(ty, out),
        Type::INT8 => value.to_sql(ty, out),
        Type::OID => u32::try_from(value)?.to_sql(ty, out),
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => (value as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(value).to_sql(ty, out),
        _ => encode_text(&value.to_string(), ty, out),
    }
}

fn encode_float(value: f64, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => value.to_sql(ty, out),
        Type::NUMERIC => Decimal::try_from(value)?.to_sql(ty, out),
        _ => encode_text(&value.to_string(), ty, out),
    }
}

fn encode_text(value: &str, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::BOOL => parse_bool(value)?.to_sql(ty, out),
        Type::INT2 => value.trim().parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => value.trim().parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => value.trim().parse::<i64>()?.to_sql(ty, out),
        Type::OID => value.trim().parse::<u32>()?.to_sql(ty, out),
        Type::FLOAT4 => value.trim().parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => value.trim().parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => parse_decimal(value)?.to_sql(ty, out),
        Type::UUID => Uuid::parse_str(value.trim())?.to_sql(ty, out),
        Type::DATE => parse_date(value)?.to_sql(ty, out),
        Type::TIME => parse_time(value)?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(value)?.naive_utc().to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamp(value)?.to_sql(ty, out),
        Type::JSON | Type::JSONB => {
            serde_json::from_str::<serde_json::Value>(value)?.to_sql(ty, out)
        }
        Type::BYTEA => value.as_bytes().to_sql(ty, out),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
            serde_json::from_str::<Vec<String>>(value)?.to_sql(ty, out)
        }
        Type::INT4_ARRAY => serde_json::from_str::<Vec<i32>>(value)?.to_sql(ty, out),
        Type::INT8_ARRAY => serde_json::from_str::<Vec<i64>>(value)?.to_sql(ty, out),
        _ => match ty.kind() {
            // Enum labels use their text representation on the wire.
            Kind::Enum(_) => {
                out.extend_from_slice(value.as_bytes());
                Ok(IsNull::No)
            }
            _ if <&str as ToSql>::accepts(ty) => value.to_sql(ty, out),
            _ => Err(format!("cannot bind {value:?} to a parameter of type {ty}").into()),
        },
    }
}

fn parse_bool(value: &str) -> Result<bool, Box<dyn Error + Sync + Send>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("invalid boolean: {other:?}").into()),
    }
}

fn parse_decimal(value: &str) -> Result<Decimal, rust_decimal::Error> {
    let value = value.trim();
    Decimal::from_str(value).or_else(|_| Decimal::from_scientific(value))
}

fn parse_date(value: &str) -> Result<NaiveDate, Box<dyn Error + Sync + Send>> {
    let value = value.trim();
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Ok(date),
        Err(_) => Ok(parse_timestamp(value)?.date_naive()),
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M:%S%.f")
}

/// RFC 3339 first, then the common naive layouts interpreted as UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, Box<dyn Error + Sync + Send>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(ts) = DateTime::parse_from_str(value, layout) {
            return Ok(ts.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, layout) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("invalid timestamp: {value:?}").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_postgres::types::FromSql;

    fn encode(value: &MirrorValue, ty: &Type) -> Result<(IsNull, BytesMut), String> {
        let mut out = BytesMut::new();
        SqlValue(value)
            .to_sql(ty, &mut out)
            .map(|is_null| (is_null, out))
            .map_err(|e| e.to_string())
    }

    fn roundtrip<T: for<'a> FromSql<'a>>(value: &MirrorValue, ty: &Type) -> T {
        let (_, bytes) = encode(value, ty).expect("encode");
        T::from_sql(ty, &bytes).expect("decode")
    }

    #[test]
    fn test_null_binds_to_anything() {
        let (is_null, bytes) = encode(&MirrorValue::Null, &Type::UUID).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_text_id_binds_to_uuid_column() {
        let id = "3f2a6c1e-8e1b-4c7d-9a4f-0b1c2d3e4f50";
        let decoded: Uuid = roundtrip(&MirrorValue::text(id), &Type::UUID);
        assert_eq!(decoded.to_string(), id);
    }

    #[test]
    fn test_integers_narrow_to_column_width() {
        let decoded: i32 = roundtrip(&MirrorValue::Integer(42), &Type::INT4);
        assert_eq!(decoded, 42);
        assert!(encode(&MirrorValue::Integer(i64::MAX), &Type::INT4).is_err());

        let from_text: i64 = roundtrip(&MirrorValue::text("9000000000"), &Type::INT8);
        assert_eq!(from_text, 9_000_000_000);
    }

    #[test]
    fn test_decimal_string_binds_to_numeric() {
        let decoded: Decimal = roundtrip(&MirrorValue::Decimal("1234.56".into()), &Type::NUMERIC);
        assert_eq!(decoded, Decimal::from_str("1234.56").unwrap());
    }

    #[test]
    fn test_timestamp_and_date() {
        let ts: DateTime<Utc> = roundtrip(
            &MirrorValue::Timestamp("2024-03-01T12:30:00+02:00".into()),
            &Type::TIMESTAMPTZ,
        );
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:30:00+00:00");

        let naive: NaiveDateTime = roundtrip(
            &MirrorValue::Timestamp("2024-03-01 12:30:00".into()),
            &Type::TIMESTAMP,
        );
        assert_eq!(naive.to_string(), "2024-03-01 12:30:00");

        let date: NaiveDate = roundtrip(&MirrorValue::Date("2024-01-15".into()), &Type::DATE);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_json_string_binds_to_jsonb() {
        let decoded: serde_json::Value =
            roundtrip(&MirrorValue::Json(r#"{"a":[1,2]}"#.into()), &Type::JSONB);
        assert_eq!(decoded, serde_json::json!({"a": [1, 2]}));
    }

    #[test]
    fn test_json_array_binds_to_text_array() {
        let decoded: Vec<String> =
            roundtrip(&MirrorValue::Json(r#"["a","b"]"#.into()), &Type::TEXT_ARRAY);
        assert_eq!(decoded, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_scalars_bind_to_text_columns() {
        let text: String = roundtrip(&MirrorValue::Integer(7), &Type::TEXT);
        assert_eq!(text, "7");
        let text: String = roundtrip(&MirrorValue::Boolean(true), &Type::VARCHAR);
        assert_eq!(text, "true");
        let text: String = roundtrip(&MirrorValue::Decimal("0.10".into()), &Type::TEXT);
        assert_eq!(text, "0.10");
    }

    #[test]
    fn test_boolean_from_text() {
        let b: bool = roundtrip(&MirrorValue::text("t"), &Type::BOOL);
        assert!(b);
        assert!(encode(&MirrorValue::text("maybe"), &Type::BOOL).is_err());
    }

    #[test]
    fn test_unconvertible_combinations_error() {
        assert!(encode(&MirrorValue::text("not-a-uuid"), &Type::UUID).is_err());
        assert!(encode(&MirrorValue::text("abc"), &Type::INT4).is_err());
        assert!(encode(&MirrorValue::text("1"), &Type::POINT).is_err());
    }
}
