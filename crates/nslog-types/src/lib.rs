//! Shared types for nslog
//!
//! This crate contains the data model that flows through the nslog pipeline:
//! severity levels, call argument values, error values and the log record.

mod error;
mod level;
mod record;
mod specifier;
mod value;

pub use error::{ErrorValue, INTERNAL_MODULES, strip_internal_frames};
pub use level::{Level, ParseLevelError};
pub use record::LogRecord;
pub use specifier::{SPECIFIERS, count_specifiers, interpolate};
pub use value::Value;

/// Default delimiter joining namespace segments
pub const DEFAULT_NAMESPACE_DELIMITER: &str = ":";
