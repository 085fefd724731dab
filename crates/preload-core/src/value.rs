//! Dynamic SQL values and normalized grouping keys.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A dynamically-typed SQL value.
///
/// Owners expose their key fields as `Value`s and storage rows carry
/// `Value`s, so this is the currency the preloader groups and filters by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 64-bit floating point
    Double(f64),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Timestamp (microseconds since epoch)
    Timestamp(i64),

    /// UUID (as 16 bytes)
    Uuid([u8; 16]),

    /// JSON value
    Json(serde_json::Value),
}

/// A hashable, totally ordered form of a non-null [`Value`].
///
/// Integer widths collapse into one variant so that an `Int(7)` foreign key
/// and a `BigInt(7)` primary key land in the same key group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyValue {
    Bool(bool),
    Int(i64),
    /// Non-integral float, stored as its bit pattern
    Float(u64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(i64),
    Uuid([u8; 16]),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Uuid(_) => "UUID",
            Value::Json(_) => "JSON",
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Normalize into a grouping key.
    ///
    /// Returns `None` for NULL, NaN and JSON values: none of them can equal a
    /// key under SQL `=`, so owners holding them get an empty target set.
    pub fn to_key(&self) -> Option<KeyValue> {
        match self {
            Value::Null | Value::Json(_) => None,
            Value::Bool(v) => Some(KeyValue::Bool(*v)),
            Value::Int(v) => Some(KeyValue::Int(i64::from(*v))),
            Value::BigInt(v) => Some(KeyValue::Int(*v)),
            Value::Double(v) => {
                if v.is_nan() {
                    None
                } else if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 {
                    #[allow(clippy::cast_possible_truncation)]
                    Some(KeyValue::Int(*v as i64))
                } else {
                    Some(KeyValue::Float(v.to_bits()))
                }
            }
            Value::Text(s) => Some(KeyValue::Text(s.clone())),
            Value::Bytes(b) => Some(KeyValue::Bytes(b.clone())),
            Value::Timestamp(t) => Some(KeyValue::Timestamp(*t)),
            Value::Uuid(u) => Some(KeyValue::Uuid(*u)),
        }
    }

    /// SQL-style comparison.
    ///
    /// Integers and floats compare numerically. NULL compares with nothing,
    /// and values of unrelated types are incomparable. Booleans only compare
    /// with booleans, matching [`to_key`](Self::to_key).
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            // Booleans group under their own keys, so they never equal a number.
            (Value::Bool(_), _) | (_, Value::Bool(_)) => None,
            (Value::Json(a), Value::Json(b)) => (a == b).then_some(Ordering::Equal),
            (Value::Double(_), _) | (_, Value::Double(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => Some(self.as_i64()?.cmp(&other.as_i64()?)),
        }
    }
}

impl From<KeyValue> for Value {
    fn from(key: KeyValue) -> Self {
        match key {
            KeyValue::Bool(v) => Value::Bool(v),
            KeyValue::Int(v) => Value::BigInt(v),
            KeyValue::Float(bits) => Value::Double(f64::from_bits(bits)),
            KeyValue::Text(s) => Value::Text(s),
            KeyValue::Bytes(b) => Value::Bytes(b),
            KeyValue::Timestamp(t) => Value::Timestamp(t),
            KeyValue::Uuid(u) => Value::Uuid(u),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widths_share_a_key() {
        assert_eq!(Value::Int(7).to_key(), Value::BigInt(7).to_key());
        assert_eq!(Value::Double(7.0).to_key(), Some(KeyValue::Int(7)));
        assert_eq!(
            Value::Double(7.5).to_key(),
            Some(KeyValue::Float(7.5_f64.to_bits()))
        );
    }

    #[test]
    fn null_like_values_have_no_key() {
        assert_eq!(Value::Null.to_key(), None);
        assert_eq!(Value::Double(f64::NAN).to_key(), None);
        assert_eq!(Value::Json(serde_json::json!({"a": 1})).to_key(), None);
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn key_converts_back_to_value() {
        let key = Value::Text("ems-1".into()).to_key();
        assert_eq!(key.map(Value::from), Some(Value::Text("ems-1".into())));
        assert_eq!(Value::from(KeyValue::Int(3)), Value::BigInt(3));
    }

    #[test]
    fn sql_cmp_is_numeric_across_widths() {
        assert_eq!(Value::Int(2).sql_cmp(&Value::BigInt(2)), Some(Ordering::Equal));
        assert_eq!(Value::Int(2).sql_cmp(&Value::Double(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Null.sql_cmp(&Value::Null), None);
        assert_eq!(Value::Text("a".into()).sql_cmp(&Value::Int(1)), None);
    }

    #[test]
    fn booleans_never_match_numbers() {
        assert_eq!(Value::Bool(true).sql_cmp(&Value::Int(1)), None);
        assert_eq!(Value::Double(0.0).sql_cmp(&Value::Bool(false)), None);
        assert_eq!(Value::Bool(false).sql_cmp(&Value::Bool(true)), Some(Ordering::Less));
        assert_ne!(Value::Bool(true).to_key(), Value::Int(1).to_key());
    }

    #[test]
    fn serde_roundtrip_preserves_variant() {
        let value = Value::Uuid([1; 16]);
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
