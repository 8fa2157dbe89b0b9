use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metadata::ValueType;

/// A value bound as a parameter, rendered as a literal, or read back from a row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Decimal text kept exact.
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Guid(Uuid),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, SqlValue::Text(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Value type this value naturally belongs to; `None` for NULL.
    pub fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            SqlValue::Null => return None,
            SqlValue::Bool(_) => ValueType::Bool,
            SqlValue::Int(_) => ValueType::Int64,
            SqlValue::Float(_) => ValueType::Float64,
            SqlValue::Decimal(_) => ValueType::Decimal,
            SqlValue::Text(_) => ValueType::Text,
            SqlValue::Bytes(_) => ValueType::Bytes,
            SqlValue::DateTime(_) => ValueType::DateTime,
            SqlValue::DateTimeOffset(_) => ValueType::DateTimeOffset,
            SqlValue::Guid(_) => ValueType::Guid,
        })
    }

    /// Converts a value read from the store into the shape of `value_type`.
    pub fn coerce(self, value_type: ValueType) -> SqlValue {
        match (value_type, self) {
            (ValueType::Bool, SqlValue::Int(v)) => SqlValue::Bool(v != 0),
            (ValueType::Float64, SqlValue::Int(v)) => SqlValue::Float(v as f64),
            (ValueType::Decimal, SqlValue::Int(v)) => SqlValue::Decimal(v.to_string()),
            (ValueType::Decimal, SqlValue::Float(v)) => SqlValue::Decimal(v.to_string()),
            (ValueType::Guid, SqlValue::Bytes(bytes)) => Uuid::from_slice(&bytes)
                .map(SqlValue::Guid)
                .unwrap_or(SqlValue::Bytes(bytes)),
            (ValueType::Guid, SqlValue::Text(text)) => Uuid::parse_str(&text)
                .map(SqlValue::Guid)
                .unwrap_or(SqlValue::Text(text)),
            (_, other) => other,
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::DateTime(value)
    }
}

impl From<DateTime<FixedOffset>> for SqlValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        SqlValue::DateTimeOffset(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Guid(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
