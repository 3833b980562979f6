use chrono::{DateTime, Utc};

use crate::error::ErrorValue;
use crate::level::Level;
use crate::specifier::interpolate;
use crate::value::Value;

/// A single log call moving through the pipeline
#[derive(Clone, Debug)]
pub struct LogRecord {
    /// Severity
    pub level: Level,

    /// Captured once at creation
    timestamp: DateTime<Utc>,

    /// Ancestor logger names followed by the logger's own name
    pub namespace_segments: Vec<String>,

    /// Joined namespace, set by the name stage
    pub namespace: Option<String>,

    /// Message template; empty when the call's message was not a string
    pub message: String,

    /// Non-string message value waiting to be moved into the payload
    pub displaced_message: Option<Value>,

    /// Arguments after the message, in call order
    pub raw_context: Vec<Value>,

    /// Leading context values consumed by the message specifiers
    pub interpolation_args: Vec<Value>,

    /// Context values not consumed by interpolation
    pub payload: Vec<Value>,

    /// Errors extracted from the payload, in scan order
    pub errors: Vec<ErrorValue>,

    /// Elapsed time for profiling records
    pub duration_ms: Option<u64>,
}

impl LogRecord {
    /// Create a record, capturing the timestamp
    pub fn new(level: Level, message: impl Into<Value>, raw_context: Vec<Value>) -> Self {
        let (message, displaced_message) = match message.into() {
            Value::Json(serde_json::Value::String(s)) => (s, None),
            other => (String::new(), Some(other)),
        };

        Self {
            level,
            timestamp: Utc::now(),
            namespace_segments: Vec::new(),
            namespace: None,
            message,
            displaced_message,
            raw_context,
            interpolation_args: Vec::new(),
            payload: Vec::new(),
            errors: Vec::new(),
            duration_ms: None,
        }
    }

    /// Attach the namespace segments contributed by logger construction
    pub fn with_segments(mut self, segments: Vec<String>) -> Self {
        self.namespace_segments = segments;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Epoch milliseconds of the timestamp
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Message with interpolation arguments substituted
    pub fn formatted_message(&self) -> String {
        interpolate(&self.message, &self.interpolation_args)
    }

    /// Whether the record carries anything beyond its message
    pub fn has_details(&self) -> bool {
        !self.payload.is_empty() || !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_message_kept() {
        let record = LogRecord::new(Level::Info, "hello %s", vec![Value::from("x")]);
        assert_eq!(record.message, "hello %s");
        assert!(record.displaced_message.is_none());
    }

    #[test]
    fn test_non_string_message_displaced() {
        let record = LogRecord::new(Level::Info, json!({"id": 1}), vec![]);
        assert_eq!(record.message, "");
        assert_eq!(record.displaced_message, Some(Value::from(json!({"id": 1}))));
    }

    #[test]
    fn test_timestamp_stable() {
        let record = LogRecord::new(Level::Info, "x", vec![]);
        let cloned = record.clone();
        assert_eq!(record.timestamp(), cloned.timestamp());
    }

    #[test]
    fn test_formatted_message() {
        let mut record = LogRecord::new(Level::Info, "%s=%d", vec![]);
        record.interpolation_args = vec![Value::from("n"), Value::from(5)];
        assert_eq!(record.formatted_message(), "n=5");
    }
}
