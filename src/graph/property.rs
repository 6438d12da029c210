//! Property value types for vertices and edges
//!
//! Only scalar types are stored; each has an order-preserving index encoding.

use crate::codec::KeyPart;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Property value type supporting multiple data types
///
/// Supports:
/// - String
/// - Integer (i64)
/// - Float (f64)
/// - Boolean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl PropertyValue {
    /// Get string value if this is a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get integer value if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get float value if this is a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get boolean value if this is a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get type name as string
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "String",
            PropertyValue::Integer(_) => "Integer",
            PropertyValue::Float(_) => "Float",
            PropertyValue::Boolean(_) => "Boolean",
        }
    }

    /// Orderable key element used in index rows.
    ///
    /// Two values match in an index exactly when their encodings are equal,
    /// which is also the equality used by unindexed property filters.
    pub fn encode_for_index(&self) -> KeyPart {
        match self {
            PropertyValue::String(s) => KeyPart::String(s.clone()),
            PropertyValue::Integer(i) => KeyPart::Int(*i),
            PropertyValue::Float(f) => KeyPart::Float(*f),
            PropertyValue::Boolean(b) => KeyPart::Bool(*b),
        }
    }

    pub fn matches(&self, other: &PropertyValue) -> bool {
        self.encode_for_index() == other.encode_for_index()
    }

    pub(crate) fn to_bytes(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Float(fl) => write!(f, "{}", fl),
            PropertyValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

// Convenience conversions
impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        PropertyValue::Integer(i as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<f32> for PropertyValue {
    fn from(f: f32) -> Self {
        PropertyValue::Float(f as f64)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_value_types() {
        assert_eq!(PropertyValue::String("test".to_string()).type_name(), "String");
        assert_eq!(PropertyValue::Integer(42).type_name(), "Integer");
        assert_eq!(PropertyValue::Float(3.14).type_name(), "Float");
        assert_eq!(PropertyValue::Boolean(true).type_name(), "Boolean");
    }

    #[test]
    fn test_property_value_conversions() {
        let string_prop: PropertyValue = "hello".into();
        assert_eq!(string_prop.as_string(), Some("hello"));

        let int_prop: PropertyValue = 42i64.into();
        assert_eq!(int_prop.as_integer(), Some(42));

        let float_prop: PropertyValue = 3.14.into();
        assert_eq!(float_prop.as_float(), Some(3.14));

        let bool_prop: PropertyValue = true.into();
        assert_eq!(bool_prop.as_boolean(), Some(true));
    }

    #[test]
    fn test_index_encoding_preserves_order() {
        let low = PropertyValue::Integer(9).encode_for_index().encode();
        let high = PropertyValue::Integer(10).encode_for_index().encode();
        assert!(low < high);

        let a = PropertyValue::from("apple").encode_for_index().encode();
        let b = PropertyValue::from("banana").encode_for_index().encode();
        assert!(a < b);
    }

    #[test]
    fn test_matches_is_type_strict() {
        assert!(PropertyValue::Integer(1).matches(&PropertyValue::Integer(1)));
        assert!(!PropertyValue::Integer(1).matches(&PropertyValue::Float(1.0)));
        assert!(!PropertyValue::from("1").matches(&PropertyValue::Integer(1)));
    }

    #[test]
    fn test_stored_bytes_round_trip() {
        let value = PropertyValue::from("Alice");
        let bytes = value.to_bytes().unwrap();
        assert_eq!(PropertyValue::from_bytes(&bytes).unwrap(), value);
    }
}
