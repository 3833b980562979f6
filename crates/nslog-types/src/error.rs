use serde_json::{Map, Value as Json, json};
use std::backtrace::Backtrace;
use std::error::Error as StdError;

use crate::value::Value;

/// Module path prefixes of the logging library itself.
///
/// Stack frames inside these modules are noise for the reader of a log line
/// and are removed from rendered stacks.
pub const INTERNAL_MODULES: &[&str] = &[
    "nslog_types::",
    "nslog_pipeline::",
    "nslog_telegram::",
    "std::backtrace::",
];

/// Built-in error fields; everything else in an error-shaped object is extra
const BUILTIN_FIELDS: &[&str] = &["name", "message", "stack", "code", "cause"];

/// An error carried by a log call
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    pub code: Option<String>,
    pub cause: Option<Box<ErrorValue>>,

    /// The error's own extra fields
    pub extra: Map<String, Json>,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            code: None,
            cause: None,
            extra: Map::new(),
        }
    }

    /// Build from a Rust error, turning its `source()` chain into causes
    pub fn from_error<E: StdError + ?Sized>(err: &E) -> Self {
        let name = short_type_name(std::any::type_name::<E>());
        let mut value = Self::new(name, err.to_string());
        value.cause = err.source().map(|source| Box::new(Self::from_source(source)));
        value
    }

    fn from_source(err: &(dyn StdError + 'static)) -> Self {
        let mut value = Self::new("Error", err.to_string());
        value.cause = err.source().map(|source| Box::new(Self::from_source(source)));
        value
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_cause(mut self, cause: ErrorValue) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Record the current call stack as this error's stack
    pub fn capture_stack(mut self) -> Self {
        let backtrace = Backtrace::force_capture();
        self.stack = Some(format!("{}: {}\n{}", self.name, self.message, backtrace));
        self
    }

    /// Classify a call argument.
    ///
    /// A value is an error if it is tagged as one, or if it is a JSON object
    /// carrying both a string `message` and a string `stack`.
    pub fn from_value(value: &Value) -> Option<ErrorValue> {
        match value {
            Value::Error(e) => Some(e.clone()),
            Value::Json(json) => Self::from_json(json),
        }
    }

    fn from_json(json: &Json) -> Option<ErrorValue> {
        let obj = json.as_object()?;
        let message = obj.get("message")?.as_str()?;
        let stack = obj.get("stack")?.as_str()?;

        let name = obj.get("name").and_then(Json::as_str).unwrap_or("Error");
        let code = match obj.get("code") {
            Some(Json::String(s)) => Some(s.clone()),
            Some(Json::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let mut extra: Map<String, Json> = obj
            .iter()
            .filter(|(k, _)| !BUILTIN_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        // A cause that is not error-shaped is kept as plain data
        let cause = match obj.get("cause") {
            Some(c) => match Self::from_json(c) {
                Some(e) => Some(Box::new(e)),
                None => {
                    extra.insert("cause".to_string(), c.clone());
                    None
                }
            },
            None => None,
        };

        Some(ErrorValue {
            name: name.to_string(),
            message: message.to_string(),
            stack: Some(stack.to_string()),
            code,
            cause,
            extra,
        })
    }

    /// This error followed by each of its causes, outermost first
    pub fn chain(&self) -> impl Iterator<Item = &ErrorValue> {
        std::iter::successors(Some(self), |e| e.cause.as_deref())
    }

    /// `Name: message`, or just the name when there is no message
    pub fn summary(&self) -> String {
        if self.message.is_empty() {
            self.name.clone()
        } else {
            format!("{}: {}", self.name, self.message)
        }
    }

    /// Stack with the logging library's own frames removed
    pub fn public_stack(&self) -> Option<String> {
        self.stack.as_deref().map(strip_internal_frames)
    }

    /// Machine-readable descriptor: `{type, code?, error?, stack, cause?, payload?}`.
    ///
    /// Without a captured stack the summary line stands in for it.
    pub fn descriptor(&self) -> Json {
        let mut obj = Map::new();
        obj.insert("type".to_string(), json!(self.name));

        if let Some(code) = &self.code {
            obj.insert("code".to_string(), json!(code));
        }
        if !self.message.is_empty() {
            obj.insert("error".to_string(), json!(self.message));
        }
        let stack = self.public_stack().unwrap_or_else(|| self.summary());
        obj.insert("stack".to_string(), json!(stack));
        if let Some(cause) = &self.cause {
            obj.insert("cause".to_string(), cause.descriptor());
        }
        if !self.extra.is_empty() {
            obj.insert("payload".to_string(), Json::Object(self.extra.clone()));
        }

        Json::Object(obj)
    }
}

/// Remove frames that belong to the logging library from a stack trace.
///
/// Understands the std backtrace layout, where a numbered frame line may be
/// followed by one `at <file>:<line>` location line.
pub fn strip_internal_frames(stack: &str) -> String {
    let mut kept = Vec::new();
    let mut skipping = false;

    for line in stack.lines() {
        let trimmed = line.trim_start();

        if is_frame_header(trimmed) {
            skipping = INTERNAL_MODULES.iter().any(|m| trimmed.contains(m));
            if !skipping {
                kept.push(line);
            }
        } else if trimmed.starts_with("at ") {
            if !skipping {
                kept.push(line);
            }
        } else {
            skipping = false;
            kept.push(line);
        }
    }

    kept.join("\n")
}

fn is_frame_header(line: &str) -> bool {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(':')
}

fn short_type_name(full: &str) -> String {
    // Drop generic arguments before taking the last path segment
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
