//! Logger configuration, loadable from TOML

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value as Json};
use tracing::debug;

use nslog_telegram::{ChatId, LimiterConfig, ParseMode};
use nslog_types::{DEFAULT_NAMESPACE_DELIMITER, Level};

use crate::filter::{FilterError, FilterOptions};
use crate::render::{CliOptions, JsonKeys};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error("failed to set up sink {sink}: {message}")]
    Sink { sink: &'static str, message: String },
}

/// Top-level logger options
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggerOptions {
    /// Drop every call
    pub silent: bool,

    /// Minimum level admitted by the logger
    pub level: Level,

    /// Name of the root logger
    pub name: Option<String>,

    pub name_delimiter: String,
    pub filter: FilterOptions,

    /// Key names for structured output
    pub json: JsonKeys,

    pub console: ConsoleOptions,
    pub file: FileOptions,
    pub telegram: TelegramOptions,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            silent: false,
            level: Level::Info,
            name: None,
            name_delimiter: DEFAULT_NAMESPACE_DELIMITER.to_string(),
            filter: FilterOptions::default(),
            json: JsonKeys::default(),
            console: ConsoleOptions::default(),
            file: FileOptions::default(),
            telegram: TelegramOptions::default(),
        }
    }
}

impl LoggerOptions {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read options from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading logger config");

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

/// Console sink options
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ConsoleOptions {
    pub silent: bool,
    pub level: Level,

    /// Levels written to stderr instead of stdout
    pub stderr_levels: Vec<Level>,

    /// Render JSON lines instead of the human layout
    pub json: bool,

    #[serde(flatten)]
    pub cli: CliOptions,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            silent: false,
            level: Level::Silly,
            stderr_levels: vec![Level::Fatal, Level::Error, Level::Warn],
            json: false,
            cli: CliOptions::default(),
        }
    }
}

/// File sink options; no file sink without a path
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    pub silent: bool,
    pub level: Level,
    pub path: Option<PathBuf>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            silent: false,
            level: Level::Warn,
            path: None,
        }
    }
}

/// Telegram sink options; no telegram sink without both token and chat
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TelegramOptions {
    pub silent: bool,
    pub level: Level,
    pub bot_token: Option<String>,
    pub chat_id: Option<ChatId>,
    pub parse_mode: ParseMode,
    pub base_url: Option<String>,
    pub time_format: Option<String>,
    pub timeout_ms: u64,
    pub queue_capacity: usize,

    /// Extra `sendMessage` fields
    pub send_message_options: Map<String, Json>,

    pub limiter: LimiterConfig,
}

impl Default for TelegramOptions {
    fn default() -> Self {
        Self {
            silent: false,
            level: Level::Warn,
            bot_token: None,
            chat_id: None,
            parse_mode: ParseMode::default(),
            base_url: None,
            time_format: None,
            timeout_ms: 10_000,
            queue_capacity: 1024,
            send_message_options: Map::new(),
            limiter: LimiterConfig::default(),
        }
    }
}

impl TelegramOptions {
    /// Token and chat, when both are set and non-empty
    pub fn credentials(&self) -> Option<(&str, &ChatId)> {
        let token = self.bot_token.as_deref().filter(|t| !t.is_empty())?;
        let chat = self.chat_id.as_ref().filter(|c| match c {
            ChatId::Username(name) => !name.is_empty(),
            ChatId::Id(_) => true,
        })?;
        Some((token, chat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let options = LoggerOptions::from_toml_str("").unwrap();
        assert_eq!(options.level, Level::Info);
        assert_eq!(options.name_delimiter, ":");
        assert_eq!(options.filter.env_key, "DEBUG");
        assert_eq!(options.console.level, Level::Silly);
        assert_eq!(options.file.level, Level::Warn);
        assert!(options.file.path.is_none());
        assert!(options.telegram.credentials().is_none());
        assert_eq!(options.telegram.limiter.min_time, Duration::from_secs(3));
    }

    #[test]
    fn test_full_document() {
        let options = LoggerOptions::from_toml_str(
            r#"
            level = "debug"
            name = "api"

            [filter]
            default_filter = "api:*,-api:health"
            level = "info"

            [json]
            timestamp = "ts"

            [console]
            single_line = true
            colors = false
            stderr_levels = ["fatal"]

            [file]
            path = "/var/log/api.log"

            [telegram]
            bot_token = "123:abc"
            chat_id = -100200
            parse_mode = "MarkdownV2"

            [telegram.send_message_options]
            disable_notification = true

            [telegram.limiter]
            min_time_ms = 500
            reservoir = 5
            "#,
        )
        .unwrap();

        assert_eq!(options.level, Level::Debug);
        assert_eq!(options.name.as_deref(), Some("api"));
        assert_eq!(options.filter.default_filter, "api:*,-api:health");
        assert_eq!(options.filter.level, Level::Info);
        assert_eq!(options.json.timestamp, "ts");
        assert_eq!(options.json.level, "level");
        assert!(options.console.cli.single_line);
        assert!(!options.console.cli.colors);
        assert_eq!(options.console.stderr_levels, vec![Level::Fatal]);
        assert_eq!(options.file.path, Some(PathBuf::from("/var/log/api.log")));
        assert_eq!(
            options.telegram.credentials(),
            Some(("123:abc", &ChatId::Id(-100200)))
        );
        assert_eq!(options.telegram.parse_mode, ParseMode::MarkdownV2);
        assert_eq!(options.telegram.send_message_options["disable_notification"], true);
        assert_eq!(options.telegram.limiter.min_time, Duration::from_millis(500));
        assert_eq!(options.telegram.limiter.reservoir, Some(5));
        assert_eq!(options.telegram.limiter.max_concurrent, 1);
    }

    #[test]
    fn test_username_chat() {
        let options = LoggerOptions::from_toml_str(
            r#"
            [telegram]
            bot_token = "t"
            chat_id = "@alerts"
            "#,
        )
        .unwrap();
        assert_eq!(
            options.telegram.chat_id,
            Some(ChatId::Username("@alerts".into()))
        );
    }

    #[test]
    fn test_missing_credential_disables_telegram() {
        let options = LoggerOptions::from_toml_str("[telegram]\nbot_token = \"t\"\n").unwrap();
        assert!(options.telegram.credentials().is_none());

        let options = LoggerOptions::from_toml_str("[telegram]\nbot_token = \"\"\nchat_id = 1\n").unwrap();
        assert!(options.telegram.credentials().is_none());
    }

    #[test]
    fn test_invalid_level_is_error() {
        assert!(matches!(
            LoggerOptions::from_toml_str("level = \"loud\""),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = LoggerOptions::load("/nonexistent/nslog.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
