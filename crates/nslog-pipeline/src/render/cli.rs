use chrono::Local;
use crossterm::style::ContentStyle;
use serde::Deserialize;
use tracing::warn;

use nslog_types::{ErrorValue, Level, LogRecord, Value};

use super::theme::Theme;
use super::{Render, indent, is_valid_time_format};

/// Console layout options
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CliOptions {
    /// Keep the whole record on one line
    pub single_line: bool,

    /// chrono format string for the timestamp
    pub time_format: String,

    /// Emit ANSI colors
    pub colors: bool,

    /// Render error stacks; defaults to `!single_line`
    pub show_error_stack: Option<bool>,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            single_line: false,
            time_format: "%H:%M:%S%.3f".to_string(),
            colors: true,
            show_error_stack: None,
        }
    }
}

/// Human-oriented console renderer:
/// `[time] LEVEL (namespace) message details duration`
#[derive(Clone, Debug, Default)]
pub struct CliRenderer {
    options: CliOptions,
}

impl CliRenderer {
    pub fn new(mut options: CliOptions) -> Self {
        if !is_valid_time_format(&options.time_format) {
            warn!(format = %options.time_format, "invalid console time format, using default");
            options.time_format = CliOptions::default().time_format;
        }
        Self { options }
    }

    pub fn options(&self) -> &CliOptions {
        &self.options
    }

    fn paint(&self, text: &str, style: ContentStyle) -> String {
        if self.options.colors {
            style.apply(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn show_stack(&self) -> bool {
        self.options
            .show_error_stack
            .unwrap_or(!self.options.single_line)
    }

    fn format_time(&self, record: &LogRecord) -> String {
        let time = record
            .timestamp()
            .with_timezone(&Local)
            .format(&self.options.time_format);
        self.paint(&format!("[{}]", time), Theme::time())
    }

    fn format_level(&self, level: Level) -> String {
        let padding = " ".repeat(Level::max_label_len() - level.as_str().len());
        format!("{}{}", self.paint(level.label(), Theme::level(level)), padding)
    }

    fn format_error(&self, error: &ErrorValue) -> String {
        let mut out = self.error_headline(error);

        if self.show_stack() {
            if let Some(stack) = error.public_stack() {
                // first line repeats name and message
                let frames: Vec<&str> = stack.lines().skip(1).collect();
                if !frames.is_empty() {
                    out.push('\n');
                    out.push_str(&self.paint(&frames.join("\n"), Theme::stack()));
                }
            }

            if !error.extra.is_empty() {
                let extra = serde_json::Value::Object(error.extra.clone());
                let pretty = serde_json::to_string_pretty(&extra).unwrap_or_default();
                out.push('\n');
                out.push_str(&indent(&pretty, 2));
            }
        }

        for cause in error.chain().skip(1) {
            out.push_str(if self.options.single_line { " " } else { "\n" });
            out.push_str("Caused by: ");
            out.push_str(&self.error_headline(cause));
        }

        out
    }

    fn error_headline(&self, error: &ErrorValue) -> String {
        let code = error
            .code
            .as_ref()
            .map(|c| format!(" ({})", c))
            .unwrap_or_default();
        let mut out = self.paint(&format!(" {}{} ", error.name, code), Theme::error_badge());
        if !error.message.is_empty() {
            out.push(' ');
            out.push_str(&self.paint(&error.message, Theme::message()));
        }
        out
    }

    fn format_payload_item(&self, item: &Value) -> String {
        if self.options.single_line {
            item.inspect(false)
        } else {
            indent(&item.inspect(true), 2)
        }
    }

    fn format_details(&self, record: &LogRecord) -> Option<String> {
        if !record.has_details() {
            return None;
        }

        let items: Vec<String> = record
            .errors
            .iter()
            .map(|e| self.format_error(e))
            .chain(record.payload.iter().map(|p| self.format_payload_item(p)))
            .collect();

        let delimiter = if self.options.single_line { " " } else { "\n" };
        Some(items.join(delimiter))
    }
}

impl Render for CliRenderer {
    fn render(&self, record: &LogRecord) -> String {
        let mut parts = vec![self.format_time(record), self.format_level(record.level)];

        if let Some(namespace) = &record.namespace {
            parts.push(self.paint(&format!("({})", namespace), Theme::namespace()));
        }

        let message = record.formatted_message();
        if !message.is_empty() {
            parts.push(self.paint(&message, Theme::message()));
        }

        if let Some(details) = self.format_details(record) {
            if self.options.single_line {
                parts.push(details);
            } else {
                parts.push(format!("\n{}", details));
            }
        }

        if let Some(ms) = record.duration_ms {
            parts.push(self.paint(&format!("{}ms", ms), Theme::duration()));
        }

        parts.join(" ")
    }
}
