use std::fmt;

use crate::error::ErrorValue;

/// A single argument of a log call
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Any structured value
    Json(serde_json::Value),

    /// An explicitly tagged error
    Error(ErrorValue),
}

impl Value {
    /// Borrow the string content if this is a JSON string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        self.as_str().is_some()
    }

    /// Numeric content, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Json(serde_json::Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    /// Convert into plain JSON; errors become their descriptor
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Json(v) => v.clone(),
            Self::Error(e) => e.descriptor(),
        }
    }

    /// Inspection form used for payload output.
    ///
    /// Strings are quoted, structured values are serialized as JSON and
    /// errors render as `Name: message`.
    pub fn inspect(&self, pretty: bool) -> String {
        match self {
            Self::Error(e) => e.summary(),
            Self::Json(v) if pretty => serde_json::to_string_pretty(v).unwrap_or_default(),
            Self::Json(v) => v.to_string(),
        }
    }
}

/// `%s`-style display: strings verbatim, everything else inspected
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => f.write_str(&self.inspect(false)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Json(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Json(serde_json::Value::String(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Json(serde_json::Value::Bool(b))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Json(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Json(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Json(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Json(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Json(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Json(
            serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        )
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<ErrorValue> for Value {
    fn from(e: ErrorValue) -> Self {
        Self::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_strings_verbatim() {
        assert_eq!(Value::from("cart").to_string(), "cart");
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(json!({"a": 1})).to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn test_inspect_quotes_strings() {
        assert_eq!(Value::from("y").inspect(false), "\"y\"");
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert_eq!(Value::from(f64::NAN), Value::Json(serde_json::Value::Null));
    }

    #[test]
    fn test_error_inspect() {
        let v = Value::from(ErrorValue::new("TypeError", "bad input"));
        assert_eq!(v.inspect(false), "TypeError: bad input");
    }
}
