//! The logging facade

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::warn;

use nslog_telegram::{Dispatcher, DispatcherConfig, ParseMode, TelegramClient, TelegramConfig};
use nslog_types::{Level, LogRecord, Value};

use crate::config::{ConfigError, LoggerOptions};
use crate::filter::FilterStage;
use crate::pipeline::Pipeline;
use crate::render::{CliRenderer, JsonRenderer, Render, TelegramFormatter};
use crate::shutdown::{ExitOutcome, ShutdownCoordinator, register_sink_drain};
use crate::sink::{Completion, ConsoleSink, Sink, SinkError, TelegramSink, WriterSink};

/// State shared by a logger and all of its children
struct Core {
    pipeline: Pipeline,
    sinks: Vec<Arc<dyn Sink>>,
    profiler: Mutex<HashMap<String, Instant>>,
    coordinator: Arc<ShutdownCoordinator>,
}

/// A named logger.
///
/// Cloning is cheap; clones and children share the pipeline, the sinks, the
/// profiler and the shutdown coordinator.
#[derive(Clone)]
pub struct Logger {
    core: Arc<Core>,
    name: Option<String>,
    parent_names: Vec<String>,
    silent: bool,
}

impl Logger {
    pub fn new(pipeline: Pipeline, sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self::with_coordinator(pipeline, sinks, Arc::new(ShutdownCoordinator::new()))
    }

    pub fn with_coordinator(
        pipeline: Pipeline,
        sinks: Vec<Arc<dyn Sink>>,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            core: Arc::new(Core {
                pipeline,
                sinks,
                profiler: Mutex::new(HashMap::new()),
                coordinator,
            }),
            name: None,
            parent_names: Vec::new(),
            silent: false,
        }
    }

    /// Build the pipeline and the configured sinks.
    ///
    /// The console sink is always present. A file sink needs `file.path`, a
    /// telegram sink needs both a bot token and a chat id and must be built
    /// inside a tokio runtime. Every sink is drained on graceful exit.
    pub fn from_options(options: &LoggerOptions) -> Result<Self, ConfigError> {
        Self::from_options_with(options, Arc::new(ShutdownCoordinator::new()))
    }

    pub fn from_options_with(
        options: &LoggerOptions,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Result<Self, ConfigError> {
        let filter = FilterStage::from_options(&options.filter, &options.name_delimiter)?;
        let pipeline = Pipeline::new(options.level, &options.name_delimiter, filter, Vec::new());

        let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

        let console = &options.console;
        let renderer: Arc<dyn Render> = if console.json {
            Arc::new(JsonRenderer::new(options.json.clone()))
        } else {
            Arc::new(CliRenderer::new(console.cli.clone()))
        };
        sinks.push(Arc::new(
            ConsoleSink::new(renderer)
                .with_level(console.level)
                .with_silent(console.silent)
                .with_stderr_levels(console.stderr_levels.clone()),
        ));

        if let Some(path) = &options.file.path {
            let sink = WriterSink::open(path).map_err(|e| ConfigError::Sink {
                sink: "file",
                message: e.to_string(),
            })?;
            sinks.push(Arc::new(
                sink.with_keys(options.json.clone())
                    .with_level(options.file.level)
                    .with_silent(options.file.silent),
            ));
        }

        let telegram = &options.telegram;
        if let Some((token, chat_id)) = telegram.credentials() {
            let sink_error = |message: String| ConfigError::Sink {
                sink: "telegram",
                message,
            };

            // the built-in formatter only emits HTML markup
            if telegram.parse_mode != ParseMode::Html {
                return Err(sink_error(format!(
                    "parse_mode {:?} does not match the HTML message format",
                    telegram.parse_mode
                )));
            }

            let mut config = TelegramConfig::new(token, chat_id.clone());
            config.parse_mode = telegram.parse_mode;
            config.timeout = Duration::from_millis(telegram.timeout_ms);
            config.send_message_options = telegram.send_message_options.clone();
            if let Some(base_url) = &telegram.base_url {
                config.base_url = base_url.clone();
            }

            let client = TelegramClient::new(config).map_err(|e| sink_error(e.to_string()))?;
            let dispatcher = Dispatcher::spawn(
                client,
                DispatcherConfig {
                    limiter: telegram.limiter.clone(),
                    queue_capacity: telegram.queue_capacity,
                    ..DispatcherConfig::default()
                },
            )
            .map_err(|e| sink_error(e.to_string()))?;

            let formatter = telegram
                .time_format
                .as_deref()
                .map(TelegramFormatter::new)
                .unwrap_or_default();

            sinks.push(Arc::new(
                TelegramSink::new(Arc::new(dispatcher))
                    .with_formatter(formatter)
                    .with_level(telegram.level)
                    .with_silent(telegram.silent),
            ));
        }

        let mut logger = Self::with_coordinator(pipeline, sinks, Arc::clone(&coordinator));
        logger.silent = options.silent;
        logger.name = options.name.clone();
        register_sink_drain(&coordinator, &logger);

        Ok(logger)
    }

    /// A logger named `name` under this one
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut parent_names = self.parent_names.clone();
        parent_names.extend(self.name.clone());

        Self {
            core: Arc::clone(&self.core),
            name: Some(name.into()),
            parent_names,
            silent: self.silent,
        }
    }

    /// A copy of this logger that drops every call
    pub fn silent(&self) -> Self {
        Self {
            silent: true,
            ..self.clone()
        }
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Ancestor names followed by this logger's name
    pub fn segments(&self) -> Vec<String> {
        let mut segments = self.parent_names.clone();
        segments.extend(self.name.clone());
        segments
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.core.pipeline
    }

    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.core.sinks
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.core.coordinator
    }

    /// Build a record carrying this logger's namespace segments
    pub fn record(&self, level: Level, message: impl Into<Value>, context: Vec<Value>) -> LogRecord {
        LogRecord::new(level, message, context).with_segments(self.segments())
    }

    pub fn log(&self, level: Level, message: impl Into<Value>, context: Vec<Value>) {
        if self.silent {
            return;
        }
        let record = self.record(level, message, context);
        // pending deliveries finish on their own; their failures are traced
        drop(self.submit(record));
    }

    /// Run `record` through the pipeline and hand the survivor to every
    /// admitting sink.
    ///
    /// Synchronous failures are traced here. The completions still pending
    /// are returned so callers may await actual delivery.
    pub fn submit(&self, record: LogRecord) -> Vec<Completion> {
        let Some(record) = self.core.pipeline.process(record) else {
            return Vec::new();
        };

        let mut pending = Vec::new();
        for sink in self.core.sinks.iter().filter(|s| s.accepts(record.level)) {
            match sink.accept(&record).try_resolve() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(sink = sink.name(), error = %err, "sink rejected record"),
                Err(completion) => pending.push(completion),
            }
        }
        pending
    }

    pub fn fatal(&self, message: impl Into<Value>, context: Vec<Value>) {
        self.log(Level::Fatal, message, context)
    }

    pub fn error(&self, message: impl Into<Value>, context: Vec<Value>) {
        self.log(Level::Error, message, context)
    }

    pub fn warn(&self, message: impl Into<Value>, context: Vec<Value>) {
        self.log(Level::Warn, message, context)
    }

    pub fn info(&self, message: impl Into<Value>, context: Vec<Value>) {
        self.log(Level::Info, message, context)
    }

    pub fn debug(&self, message: impl Into<Value>, context: Vec<Value>) {
        self.log(Level::Debug, message, context)
    }

    pub fn trace(&self, message: impl Into<Value>, context: Vec<Value>) {
        self.log(Level::Trace, message, context)
    }

    pub fn silly(&self, message: impl Into<Value>, context: Vec<Value>) {
        self.log(Level::Silly, message, context)
    }

    /// Start the timer `id`, or stop it and log an `info` record named `id`
    pub fn profile(&self, id: &str) {
        self.profile_with(id, Level::Info, id, Vec::new())
    }

    /// Like [`Logger::profile`], with the stopping record's level, message
    /// and context
    pub fn profile_with(&self, id: &str, level: Level, message: impl Into<Value>, context: Vec<Value>) {
        let started = {
            let mut timers = self.core.profiler.lock();
            match timers.remove(id) {
                Some(started) => started,
                None => {
                    timers.insert(id.to_string(), Instant::now());
                    return;
                }
            }
        };

        if self.silent {
            return;
        }
        let elapsed = started.elapsed().as_millis() as u64;
        let record = self.record(level, message, context).with_duration(elapsed);
        drop(self.submit(record));
    }

    /// Wait for every sink to write what it has accepted.
    ///
    /// All sinks are flushed; the first failure is returned.
    pub async fn flush(&self) -> Result<(), SinkError> {
        let flushes: Vec<_> = self.core.sinks.iter().map(|s| (s.name().to_string(), s.flush())).collect();

        let mut first = None;
        for (name, completion) in flushes {
            if let Err(err) = completion.wait().await {
                warn!(sink = %name, error = %err, "sink flush failed");
                first.get_or_insert(err);
            }
        }

        first.map_or(Ok(()), Err)
    }

    /// Request a graceful exit with `code`
    pub async fn exit(&self, code: i32) -> ExitOutcome {
        self.core.coordinator.request_exit(code).await
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("parent_names", &self.parent_names)
            .field("silent", &self.silent)
            .field("pipeline", &self.core.pipeline)
            .field("sinks", &self.core.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}
