/// Value Model
///
/// Dynamic column values exchanged with SQLite, and the tri-state `Field`
/// used by write payloads to tell "not assigned yet" apart from NULL.
use crate::core::db::schema::ColumnType;
use crate::core::{Result, TablekitError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Text layout used when binding timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Layouts accepted when decoding timestamps stored as text.
const TIMESTAMP_PARSE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    /// Floating point value from an untyped result column
    Real(f64),
    Text(String),
    /// Arbitrary-precision base-10 number
    Decimal(Decimal),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Decodes a raw SQLite value with no knowledge of the declared column type.
    pub fn from_raw(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).to_string()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }

    /// Decodes a raw SQLite value using the reflected column type.
    pub fn from_column(value: ValueRef<'_>, column_type: ColumnType) -> Self {
        Value::from_raw(value).into_column_type(column_type)
    }

    /// Reinterprets a raw value as the declared column type.
    ///
    /// Storage that does not fit the declared type is returned unchanged
    /// rather than failing, since SQLite does not enforce declared types.
    pub fn into_column_type(self, column_type: ColumnType) -> Self {
        match (column_type, self) {
            (ColumnType::Decimal, Value::Integer(i)) => Value::Decimal(Decimal::from(i)),
            // Shortest round-trip text keeps 0.99 as 0.99 instead of its binary expansion
            (ColumnType::Decimal, Value::Real(f)) => match Decimal::from_str(&f.to_string()) {
                Ok(d) => Value::Decimal(d),
                Err(_) => Value::Real(f),
            },
            (ColumnType::Decimal, Value::Text(t)) => match Decimal::from_str(t.trim()) {
                Ok(d) => Value::Decimal(d),
                Err(_) => Value::Text(t),
            },
            (ColumnType::Timestamp, Value::Text(t)) => match parse_timestamp(&t) {
                Some(ts) => Value::Timestamp(ts),
                None => Value::Text(t),
            },
            (ColumnType::Timestamp, Value::Integer(secs)) => {
                match DateTime::<Utc>::from_timestamp(secs, 0) {
                    Some(ts) => Value::Timestamp(ts.naive_utc()),
                    None => Value::Integer(secs),
                }
            }
            (_, value) => value,
        }
    }
}

/// Parses the timestamp layouts SQLite applications commonly store.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_PARSE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(t) => write!(f, "{}", t),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(r) => ToSqlOutput::from(*r),
            Value::Text(t) => ToSqlOutput::from(t.as_str()),
            Value::Decimal(d) => ToSqlOutput::from(d.to_string()),
            Value::Timestamp(ts) => ToSqlOutput::from(ts.format(TIMESTAMP_FORMAT).to_string()),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
        })
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(r) => serializer.serialize_f64(*r),
            Value::Text(t) => serializer.serialize_str(t),
            Value::Decimal(_) | Value::Timestamp(_) => serializer.collect_str(self),
            Value::Blob(b) => serializer.serialize_bytes(b),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

fn conversion_error(value: &Value, target: &str) -> TablekitError {
    TablekitError::Conversion(format!("cannot read {:?} as {}", value, target))
}

impl TryFrom<&Value> for i64 {
    type Error = TablekitError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(*i),
            _ => Err(conversion_error(value, "i64")),
        }
    }
}

impl TryFrom<&Value> for String {
    type Error = TablekitError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Text(t) => Ok(t.clone()),
            _ => Err(conversion_error(value, "String")),
        }
    }
}

impl TryFrom<&Value> for Decimal {
    type Error = TablekitError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Integer(i) => Ok(Decimal::from(*i)),
            _ => Err(conversion_error(value, "Decimal")),
        }
    }
}

impl TryFrom<&Value> for NaiveDateTime {
    type Error = TablekitError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            _ => Err(conversion_error(value, "NaiveDateTime")),
        }
    }
}

impl TryFrom<&Value> for Vec<u8> {
    type Error = TablekitError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            _ => Err(conversion_error(value, "Vec<u8>")),
        }
    }
}

/// Per-field state of a write payload.
///
/// `Unset` means the caller never assigned the field: the column is left out
/// of the generated statement so backend defaults apply. It is never bound.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Field {
    #[default]
    Unset,
    Null,
    Value(Value),
}

impl Field {
    pub fn is_unset(&self) -> bool {
        matches!(self, Field::Unset)
    }

    /// The value to bind, or `None` when the column must be omitted.
    pub fn bound_value(&self) -> Option<Value> {
        match self {
            Field::Unset => None,
            Field::Null => Some(Value::Null),
            Field::Value(v) => Some(v.clone()),
        }
    }
}

impl From<Value> for Field {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Field::Null,
            v => Field::Value(v),
        }
    }
}

macro_rules! field_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Field {
                fn from(v: $t) -> Self {
                    Field::from(Value::from(v))
                }
            }
        )*
    };
}

field_from!(i64, i32, f64, &str, String, Decimal, NaiveDateTime, Vec<u8>);

impl<T: Into<Value>> From<Option<T>> for Field {
    fn from(v: Option<T>) -> Self {
        Field::from(Value::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_decoding_keeps_shortest_form() {
        let v = Value::from_column(ValueRef::Real(0.99), ColumnType::Decimal);
        assert_eq!(v, Value::Decimal(Decimal::from_str("0.99").unwrap()));

        let v = Value::from_column(ValueRef::Integer(2), ColumnType::Decimal);
        assert_eq!(v, Value::Decimal(Decimal::from(2)));

        let v = Value::from_column(
            ValueRef::Text(b"12345678901234567.123456789"),
            ColumnType::Decimal,
        );
        assert_eq!(
            v,
            Value::Decimal(Decimal::from_str("12345678901234567.123456789").unwrap())
        );
    }

    #[test]
    fn test_timestamp_decoding() {
        let expected = NaiveDate::from_ymd_opt(2009, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        for text in ["2009-01-01 00:00:00", "2009-01-01T00:00:00", "2009-01-01"] {
            let v = Value::from_column(ValueRef::Text(text.as_bytes()), ColumnType::Timestamp);
            assert_eq!(v, Value::Timestamp(expected), "failed on {}", text);
        }

        let v = Value::from_column(ValueRef::Integer(1230768000), ColumnType::Timestamp);
        assert_eq!(v, Value::Timestamp(expected));
    }

    #[test]
    fn test_undecodable_values_stay_raw() {
        let v = Value::from_column(ValueRef::Text(b"soon"), ColumnType::Timestamp);
        assert_eq!(v, Value::Text("soon".to_string()));

        let v = Value::from_column(ValueRef::Text(b"n/a"), ColumnType::Decimal);
        assert_eq!(v, Value::Text("n/a".to_string()));

        let v = Value::from_column(ValueRef::Integer(7), ColumnType::Text);
        assert_eq!(v, Value::Integer(7));
    }

    #[test]
    fn test_field_binding() {
        assert_eq!(Field::Unset.bound_value(), None);
        assert_eq!(Field::Null.bound_value(), Some(Value::Null));
        assert_eq!(Field::from("Queen").bound_value(), Some(Value::from("Queen")));
        assert_eq!(Field::from(None::<i64>), Field::Null);
    }

    #[test]
    fn test_typed_extraction() {
        assert_eq!(i64::try_from(&Value::Integer(3)).unwrap(), 3);
        assert!(matches!(
            String::try_from(&Value::Integer(3)),
            Err(TablekitError::Conversion(_))
        ));
    }

    #[test]
    fn test_json_serialization() {
        let d = Value::Decimal(Decimal::from_str("1.99").unwrap());
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"1.99\"");
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
    }
}
