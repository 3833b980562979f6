use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use nslog_types::{Level, LogRecord};

use super::{Completion, Sink};

/// Thread-safe ring buffer of finished records
#[derive(Clone)]
pub struct MemorySink {
    /// Internal storage
    records: Arc<RwLock<VecDeque<LogRecord>>>,

    /// Maximum capacity
    capacity: usize,

    level: Level,
}

impl MemorySink {
    /// Create a buffer holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            level: Level::Silly,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Push a record, evicting the oldest if at capacity
    pub fn push(&self, record: LogRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.records.write();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// All buffered records, oldest first
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.read().iter().cloned().collect()
    }

    /// Records at least as severe as `min_level`
    pub fn by_level(&self, min_level: Level) -> Vec<LogRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.level.is_at_least_as_severe_as(min_level))
            .cloned()
            .collect()
    }

    /// Record count per level
    pub fn level_counts(&self) -> LevelCounts {
        let records = self.records.read();
        let mut counts = LevelCounts::default();

        for record in records.iter() {
            match record.level {
                Level::Fatal => counts.fatal += 1,
                Level::Error => counts.error += 1,
                Level::Warn => counts.warn += 1,
                Level::Info => counts.info += 1,
                Level::Debug => counts.debug += 1,
                Level::Trace => counts.trace += 1,
                Level::Silly => counts.silly += 1,
            }
        }

        counts
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// The last `n` records
    pub fn tail(&self, n: usize) -> Vec<LogRecord> {
        let records = self.records.read();
        let start = records.len().saturating_sub(n);
        records.iter().skip(start).cloned().collect()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn level(&self) -> Level {
        self.level
    }

    fn accept(&self, record: &LogRecord) -> Completion {
        self.push(record.clone());
        Completion::ok()
    }

    fn flush(&self) -> Completion {
        Completion::ok()
    }
}

/// Counts per level
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub fatal: usize,
    pub error: usize,
    pub warn: usize,
    pub info: usize,
    pub debug: usize,
    pub trace: usize,
    pub silly: usize,
}

impl LevelCounts {
    pub fn total(&self) -> usize {
        self.fatal + self.error + self.warn + self.info + self.debug + self.trace + self.silly
    }
}
