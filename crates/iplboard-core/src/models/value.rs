//! Scalar cell values returned by the warehouse

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell of a result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Read as integer
    ///
    /// Floats with no fractional part (e.g. `ROUND(AVG(x), 0)`) and numeric
    /// text (warehouses that return NUMBER columns as strings) are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read as float (integers widen)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Label used when the value keys a group or a season
    pub fn to_label(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
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

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_float_reads_as_int() {
        assert_eq!(Value::Float(160.0).as_i64(), Some(160));
        assert_eq!(Value::Float(160.5).as_i64(), None);
    }

    #[test]
    fn test_numeric_text() {
        assert_eq!(Value::from("1234").as_i64(), Some(1234));
        assert_eq!(Value::from("56.25").as_f64(), Some(56.25));
        assert_eq!(Value::from("Powerplay").as_i64(), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Value::Int(2019).to_label(), "2019");
        assert_eq!(Value::from("2019/20").to_label(), "2019/20");
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Value::Int(1),
            Value::Float(2.5),
            Value::from("x"),
            Value::Null,
        ])
        .unwrap();
        assert_eq!(json, r#"[1,2.5,"x",null]"#);
    }
}
