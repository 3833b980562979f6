use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Log severity level
///
/// Variants are declared from most to least severe, so the derived ordering
/// matches the ordinal: `Fatal < Error < ... < Silly`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Fatal,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
    Silly,
}

impl Level {
    /// All levels, most severe first
    pub const ALL: [Level; 7] = [
        Level::Fatal,
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Debug,
        Level::Trace,
        Level::Silly,
    ];

    /// Numeric priority; lower means more severe
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Fatal => 0,
            Self::Error => 1,
            Self::Warn => 2,
            Self::Info => 3,
            Self::Debug => 4,
            Self::Trace => 5,
            Self::Silly => 6,
        }
    }

    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::Silly => "silly",
        }
    }

    /// Uppercase label for human output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
            Self::Silly => "SILLY",
        }
    }

    /// Whether `self` is at least as severe as `threshold`.
    ///
    /// A sink configured at `Warn` admits `Fatal`, `Error` and `Warn`.
    pub fn is_at_least_as_severe_as(&self, threshold: Level) -> bool {
        self.ordinal() <= threshold.ordinal()
    }

    /// Length of the longest label, used to align console output
    pub fn max_label_len() -> usize {
        Self::ALL.iter().map(|l| l.as_str().len()).max().unwrap_or(0)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fatal" => Ok(Self::Fatal),
            "error" | "err" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            "silly" => Ok(Self::Silly),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}
