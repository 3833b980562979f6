use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value as Json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use nslog_pipeline::{ChatId, FATAL_EXIT_CODE, Logger, LoggerOptions, install_panic_hook};
use nslog_types::{Level, Value};

/// nslog - Namespace-filtered logging for line-oriented input
///
/// Reads lines from stdin and logs each one. A line holding a JSON object
/// with a `message` field is logged with its `level`, `namespace` and
/// `context` fields; any other line is logged as plain text.
#[derive(Parser, Debug)]
#[command(name = "nslog")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Minimum level to log
    #[arg(long)]
    level: Option<Level>,

    /// Level for lines that do not carry one
    #[arg(long, default_value = "info")]
    line_level: Level,

    /// Root logger name
    #[arg(long)]
    name: Option<String>,

    /// Namespace filter, overriding the environment
    #[arg(long)]
    filter: Option<String>,

    /// Keep each record on one line
    #[arg(long)]
    single_line: bool,

    /// Write JSON lines to the console
    #[arg(long)]
    json: bool,

    /// Telegram bot token
    #[arg(long, env = "NSLOG_TELEGRAM_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,

    /// Telegram chat id or @channel
    #[arg(long)]
    telegram_chat: Option<String>,
}

impl Args {
    /// Load the config file, then apply command line overrides
    fn options(&self) -> Result<LoggerOptions> {
        let mut options = match &self.config {
            Some(path) => LoggerOptions::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => LoggerOptions::default(),
        };

        if let Some(level) = self.level {
            options.level = level;
        }
        if let Some(name) = &self.name {
            options.name = Some(name.clone());
        }
        if let Some(filter) = &self.filter {
            options.filter.filter = Some(filter.clone());
        }
        if self.single_line {
            options.console.cli.single_line = true;
        }
        if self.json {
            options.console.json = true;
        }
        if let Some(token) = &self.telegram_token {
            options.telegram.bot_token = Some(token.clone());
        }
        if let Some(chat) = &self.telegram_chat {
            options.telegram.chat_id = Some(parse_chat_id(chat));
        }

        Ok(options)
    }
}

fn parse_chat_id(input: &str) -> ChatId {
    input
        .parse::<i64>()
        .map(ChatId::Id)
        .unwrap_or_else(|_| ChatId::Username(input.to_string()))
}

/// One input line turned into log call arguments
#[derive(Debug, PartialEq)]
struct Line {
    level: Level,
    namespace: Vec<String>,
    message: Value,
    context: Vec<Value>,
}

fn parse_line(line: &str, default_level: Level, delimiter: &str) -> Line {
    let plain = || Line {
        level: default_level,
        namespace: Vec::new(),
        message: Value::from(line),
        context: Vec::new(),
    };

    let Ok(Json::Object(mut obj)) = serde_json::from_str::<Json>(line) else {
        return plain();
    };
    let Some(message) = obj.remove("message") else {
        return plain();
    };

    let level = obj
        .get("level")
        .and_then(Json::as_str)
        .and_then(|l| l.parse().ok())
        .unwrap_or(default_level);

    let namespace = obj
        .get("namespace")
        .and_then(Json::as_str)
        .map(|ns| {
            ns.split(delimiter)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let context = match obj.remove("context") {
        Some(Json::Array(items)) => items.into_iter().map(Value::from).collect(),
        Some(other) => vec![Value::from(other)],
        None => Vec::new(),
    };

    Line {
        level,
        namespace,
        message: Value::from(message),
        context,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Diagnostics of nslog itself go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("NSLOG_LOG")
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let options = args.options()?;
    let logger = Logger::from_options(&options).context("building logger")?;
    install_panic_hook(logger.clone(), Arc::clone(logger.coordinator()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut count = 0usize;

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let parsed = parse_line(&line, args.line_level, &options.name_delimiter);
        let target = parsed
            .namespace
            .iter()
            .fold(logger.clone(), |logger, segment| logger.child(segment.as_str()));

        let fatal = parsed.level == Level::Fatal;
        target.log(parsed.level, parsed.message, parsed.context);
        count += 1;

        if fatal {
            debug!(lines = count, "fatal line, exiting");
            logger.exit(FATAL_EXIT_CODE).await;
            return Ok(());
        }
    }

    debug!(lines = count, "input finished, draining sinks");
    logger.exit(0).await;
    Ok(())
}
