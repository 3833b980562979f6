use serde::Deserialize;
use serde_json::{Map, Value as Json, json};

use nslog_types::LogRecord;

use super::Render;

/// Output key names of the structured renderer
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JsonKeys {
    pub level: String,
    pub timestamp: String,
    pub namespace: String,
    pub message: String,
    pub error: String,
    pub payload: String,
    pub duration: String,
}

impl Default for JsonKeys {
    fn default() -> Self {
        Self {
            level: "level".to_string(),
            timestamp: "timestamp".to_string(),
            namespace: "namespace".to_string(),
            message: "message".to_string(),
            error: "error".to_string(),
            payload: "payload".to_string(),
            duration: "durationMs".to_string(),
        }
    }
}

/// Machine renderer producing one flat JSON object per record.
///
/// Empty parts are omitted. One error renders as a descriptor object,
/// several as an array of descriptors in extraction order.
#[derive(Clone, Debug, Default)]
pub struct JsonRenderer {
    keys: JsonKeys,
}

impl JsonRenderer {
    pub fn new(keys: JsonKeys) -> Self {
        Self { keys }
    }

    /// Structured form of `record`
    pub fn to_value(&self, record: &LogRecord) -> Json {
        let mut obj = Map::new();
        obj.insert(self.keys.level.clone(), json!(record.level.as_str()));
        obj.insert(self.keys.timestamp.clone(), json!(record.timestamp_millis()));

        if let Some(namespace) = &record.namespace {
            obj.insert(self.keys.namespace.clone(), json!(namespace));
        }

        let message = record.formatted_message();
        if !message.is_empty() {
            obj.insert(self.keys.message.clone(), json!(message));
        }

        match record.errors.as_slice() {
            [] => {}
            [single] => {
                obj.insert(self.keys.error.clone(), single.descriptor());
            }
            many => {
                let descriptors = many.iter().map(|e| e.descriptor()).collect();
                obj.insert(self.keys.error.clone(), Json::Array(descriptors));
            }
        }

        if !record.payload.is_empty() {
            let payload = record.payload.iter().map(|v| v.to_json()).collect();
            obj.insert(self.keys.payload.clone(), Json::Array(payload));
        }

        if let Some(ms) = record.duration_ms {
            obj.insert(self.keys.duration.clone(), json!(ms));
        }

        Json::Object(obj)
    }
}

impl Render for JsonRenderer {
    fn render(&self, record: &LogRecord) -> String {
        self.to_value(record).to_string()
    }
}
