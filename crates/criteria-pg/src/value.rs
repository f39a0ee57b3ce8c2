//! Value representations on either side of the casting boundary.
//!
//! [`WireValue`] is what a driver hands back: the narrow set of shapes a
//! text-oriented wire protocol can produce. [`Value`] is the typed
//! application-side value the casting engine produces from it, and the type
//! callers use for criteria operands and insert/update payloads.

use std::collections::HashMap;

use chrono::NaiveDateTime;

/// A raw value as returned by the underlying store.
///
/// Drivers normalize every column into one of these shapes; anything richer
/// (booleans as word tokens, arrays as encoded text) is decoded later by the
/// casting engine, driven by the schema.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl WireValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }
}

/// A typed application value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Timestamp without timezone.
    Date(NaiveDateTime),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Return a lowercased copy if this is a text value, otherwise a clone.
    ///
    /// Text comparisons are case-insensitive; this is the fold applied to
    /// bound parameters for text columns.
    #[must_use]
    pub fn folded(&self) -> Value {
        match self {
            Value::Text(s) => Value::Text(s.to_lowercase()),
            other => other.clone(),
        }
    }
}

impl From<WireValue> for Value {
    /// Representation-preserving conversion for columns the schema does not
    /// describe; no type-directed decoding happens here.
    fn from(wire: WireValue) -> Self {
        match wire {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Integer(i) => Value::Integer(i),
            WireValue::Number(f) => Value::Float(f),
            WireValue::Text(s) => Value::Text(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
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

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Date(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// A raw row: column name to wire value.
pub type WireRow = HashMap<String, WireValue>;

/// A cast row: column name to typed value.
pub type CastRow = HashMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folded_lowercases_text_only() {
        assert_eq!(
            Value::Text("FooBar".into()).folded(),
            Value::Text("foobar".into())
        );
        assert_eq!(Value::Integer(42).folded(), Value::Integer(42));
        assert_eq!(Value::Null.folded(), Value::Null);
    }

    #[test]
    fn test_wire_conversion_preserves_representation() {
        assert_eq!(Value::from(WireValue::Integer(7)), Value::Integer(7));
        assert_eq!(Value::from(WireValue::Number(1.5)), Value::Float(1.5));
        assert_eq!(
            Value::from(WireValue::Text("t".into())),
            Value::Text("t".into())
        );
        assert!(Value::from(WireValue::Null).is_null());
    }
}
