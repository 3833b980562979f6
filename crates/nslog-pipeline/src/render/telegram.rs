use chrono::Local;
use serde::Deserialize;
use tracing::warn;

use nslog_types::{ErrorValue, LogRecord};

use super::{Render, is_valid_time_format};

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn bold(text: &str) -> String {
    format!("<b>{}</b>", escape_html(text))
}

fn monospace(text: &str) -> String {
    format!("<code>{}</code>", escape_html(text))
}

fn monospace_block(text: &str) -> String {
    format!("<pre>{}</pre>", escape_html(text))
}

/// Renders a record as a bulleted HTML chat message
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TelegramFormatter {
    pub time_format: String,
}

impl Default for TelegramFormatter {
    fn default() -> Self {
        Self {
            time_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl TelegramFormatter {
    pub fn new(time_format: impl Into<String>) -> Self {
        let time_format = time_format.into();
        if is_valid_time_format(&time_format) {
            Self { time_format }
        } else {
            warn!(format = %time_format, "invalid telegram time format, using default");
            Self::default()
        }
    }

    fn error_lines(&self, error: &ErrorValue, lines: &mut Vec<String>) {
        lines.push(format!("• Error: {}", monospace(&error.summary())));
        if let Some(stack) = error.public_stack() {
            lines.push(format!("• Stack:\n{}", monospace_block(&stack)));
        }
        for cause in error.chain().skip(1) {
            lines.push(format!("• Caused by: {}", monospace(&cause.summary())));
        }
    }
}

impl Render for TelegramFormatter {
    fn render(&self, record: &LogRecord) -> String {
        let time = record
            .timestamp()
            .with_timezone(&Local)
            .format(&self.time_format)
            .to_string();

        let mut lines = vec![
            format!("• Level: {}", bold(&record.level.as_str().to_uppercase())),
            format!("• Time: {}", bold(&time)),
        ];

        if let Some(namespace) = &record.namespace {
            lines.push(format!("• Namespace: {}", bold(namespace)));
        }

        let message = record.formatted_message();
        if !message.is_empty() {
            lines.push(format!("• Message: {}", monospace(&message)));
        }

        for error in &record.errors {
            self.error_lines(error, &mut lines);
        }

        if !record.payload.is_empty() {
            let payload = record
                .payload
                .iter()
                .map(|item| item.inspect(false))
                .collect::<Vec<_>>()
                .join(" ");
            lines.push(format!("• Payload:\n{}", monospace_block(&payload)));
        }

        if let Some(ms) = record.duration_ms {
            lines.push(format!("• Duration: {}", bold(&format!("{}ms", ms))));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nslog_types::{Level, Value};
    use serde_json::json;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > \"d\""), "a &lt; b &amp;&amp; c &gt; &quot;d&quot;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_render_layout() {
        let mut record = LogRecord::new(Level::Error, "payment <failed>", vec![]);
        record.namespace = Some("billing".into());
        record.payload = vec![Value::from(json!({"id": 7}))];

        let text = TelegramFormatter::default().render(&record);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "• Level: <b>ERROR</b>");
        assert!(lines[1].starts_with("• Time: <b>"));
        assert_eq!(lines[2], "• Namespace: <b>billing</b>");
        assert_eq!(lines[3], "• Message: <code>payment &lt;failed&gt;</code>");
        assert_eq!(lines[4], "• Payload:");
        assert_eq!(lines[5], "<pre>{&quot;id&quot;:7}</pre>");
    }

    #[test]
    fn test_render_errors() {
        let mut record = LogRecord::new(Level::Fatal, "", vec![]);
        record.errors = vec![
            ErrorValue::new("TypeError", "bad")
                .with_stack("TypeError: bad\n    at f (a.rs:1)")
                .with_cause(ErrorValue::new("IoError", "eof")),
        ];

        let text = TelegramFormatter::default().render(&record);
        assert!(text.contains("• Error: <code>TypeError: bad</code>"));
        assert!(text.contains("• Stack:\n<pre>TypeError: bad\n    at f (a.rs:1)</pre>"));
        assert!(text.contains("• Caused by: <code>IoError: eof</code>"));
        assert!(!text.contains("• Message"));
    }

    #[test]
    fn test_time_format() {
        let record = LogRecord::new(Level::Warn, "m", vec![]);
        let text = TelegramFormatter::new("%Y").render(&record);
        let year = record.timestamp().with_timezone(&Local).format("%Y").to_string();
        assert!(text.contains(&format!("• Time: <b>{}</b>", year)));

        assert_eq!(TelegramFormatter::new("%Q").time_format, "%Y-%m-%d %H:%M:%S");
    }
}
