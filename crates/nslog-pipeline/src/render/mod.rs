//! Projections of a finished record into text

mod cli;
mod json;
mod telegram;
mod theme;

pub use cli::{CliOptions, CliRenderer};
pub use json::{JsonKeys, JsonRenderer};
pub use telegram::{TelegramFormatter, escape_html};
pub use theme::Theme;

use chrono::format::{Item, StrftimeItems};
use nslog_types::LogRecord;

/// Turns a record into the text a sink writes
pub trait Render: Send + Sync {
    fn render(&self, record: &LogRecord) -> String;
}

/// Indent every line of `input` by `size` spaces
pub(crate) fn indent(input: &str, size: usize) -> String {
    let pad = " ".repeat(size);
    input
        .lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether chrono can format with `format` without error
pub(crate) fn is_valid_time_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}
