use std::sync::Arc;

use tracing::debug;

use nslog_telegram::Dispatcher;
use nslog_types::{Level, LogRecord};

use super::{Completion, Sink, SinkError};
use crate::render::{Render, TelegramFormatter};

/// Sends records as chat messages through a rate-limited dispatcher
pub struct TelegramSink {
    dispatcher: Arc<Dispatcher>,
    formatter: TelegramFormatter,
    level: Level,
    silent: bool,
}

impl TelegramSink {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            formatter: TelegramFormatter::default(),
            level: Level::Warn,
            silent: false,
        }
    }

    pub fn with_formatter(mut self, formatter: TelegramFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl Sink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    fn level(&self) -> Level {
        self.level
    }

    fn is_silent(&self) -> bool {
        self.silent
    }

    fn accept(&self, record: &LogRecord) -> Completion {
        let text = self.formatter.render(record);
        debug!(level = %record.level, len = text.len(), "queueing telegram message");

        let receiver = self.dispatcher.dispatch(&text);
        Completion::pending(async move {
            Dispatcher::outcome(receiver)
                .await
                .map(|_| ())
                .map_err(SinkError::from)
        })
    }

    fn flush(&self) -> Completion {
        let dispatcher = Arc::clone(&self.dispatcher);
        Completion::pending(async move { dispatcher.flush().await.map_err(SinkError::from) })
    }
}
