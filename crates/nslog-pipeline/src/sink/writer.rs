use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use nslog_types::{Level, LogRecord};

use super::{Completion, Sink, SinkError};
use crate::render::{JsonKeys, JsonRenderer, Render};

/// How long a panicking thread waits for the writer lock
const PANIC_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Writes one JSON object per line to any writer
pub struct WriterSink<W> {
    writer: Mutex<W>,
    renderer: JsonRenderer,
    level: Level,
    silent: bool,
}

impl WriterSink<File> {
    /// Append to the file at `path`, creating it and its parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            renderer: JsonRenderer::default(),
            level: Level::Warn,
            silent: false,
        }
    }

    pub fn with_keys(mut self, keys: JsonKeys) -> Self {
        self.renderer = JsonRenderer::new(keys);
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

    /// Borrow the underlying writer
    pub fn writer(&self) -> MutexGuard<'_, W> {
        self.writer.lock()
    }

    /// Lock the writer, giving up after a short wait while panicking.
    ///
    /// The panic hook logs from the panicking thread, which may already hold
    /// this lock if the writer itself panicked.
    fn lock_writer(&self) -> Result<MutexGuard<'_, W>, SinkError> {
        if std::thread::panicking() {
            return self.writer.try_lock_for(PANIC_LOCK_TIMEOUT).ok_or(SinkError::Busy);
        }
        Ok(self.writer.lock())
    }

    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        let mut writer = self.lock_writer()?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn name(&self) -> &str {
        "writer"
    }

    fn level(&self) -> Level {
        self.level
    }

    fn is_silent(&self) -> bool {
        self.silent
    }

    fn accept(&self, record: &LogRecord) -> Completion {
        let line = self.renderer.render(record);
        Completion::ready(self.write_line(&line))
    }

    fn flush(&self) -> Completion {
        let flushed = self
            .lock_writer()
            .and_then(|mut writer| writer.flush().map_err(SinkError::from));
        Completion::ready(flushed)
    }
}
