use std::io::{self, Write};
use std::sync::Arc;

use nslog_types::{Level, LogRecord};

use super::{Completion, Sink};
use crate::render::{CliRenderer, Render};

/// Process output stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Writes rendered records to stdout, or stderr for the configured levels
pub struct ConsoleSink {
    renderer: Arc<dyn Render>,
    level: Level,
    silent: bool,
    stderr_levels: Vec<Level>,
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(Arc::new(CliRenderer::default()))
    }
}

impl ConsoleSink {
    pub fn new(renderer: Arc<dyn Render>) -> Self {
        Self {
            renderer,
            level: Level::Silly,
            silent: false,
            stderr_levels: vec![Level::Fatal, Level::Error, Level::Warn],
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_stderr_levels(mut self, levels: Vec<Level>) -> Self {
        self.stderr_levels = levels;
        self
    }

    pub fn stream_for(&self, level: Level) -> Stream {
        if self.stderr_levels.contains(&level) {
            Stream::Stderr
        } else {
            Stream::Stdout
        }
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn level(&self) -> Level {
        self.level
    }

    fn is_silent(&self) -> bool {
        self.silent
    }

    fn accept(&self, record: &LogRecord) -> Completion {
        let line = self.renderer.render(record);
        let result = match self.stream_for(record.level) {
            Stream::Stdout => writeln!(io::stdout().lock(), "{}", line),
            Stream::Stderr => writeln!(io::stderr().lock(), "{}", line),
        };
        Completion::ready(result.map_err(Into::into))
    }

    fn flush(&self) -> Completion {
        let result = io::stdout().flush().and_then(|_| io::stderr().flush());
        Completion::ready(result.map_err(Into::into))
    }
}
