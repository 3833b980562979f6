//! Destinations for finished records

mod console;
mod memory;
mod telegram;
mod writer;

pub use console::{ConsoleSink, Stream};
pub use memory::{LevelCounts, MemorySink};
pub use telegram::TelegramSink;
pub use writer::WriterSink;

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;

use nslog_telegram::DispatchError;
use nslog_types::{Level, LogRecord};

/// Errors surfaced by a sink's completion
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DispatchError),

    #[error("sink is busy")]
    Busy,
}

/// Result of handing a record to a sink.
///
/// Synchronous sinks resolve immediately; asynchronous ones resolve once the
/// record has actually left the process.
pub struct Completion(Inner);

enum Inner {
    Ready(Result<(), SinkError>),
    Pending(BoxFuture<'static, Result<(), SinkError>>),
}

impl Completion {
    pub fn ready(result: Result<(), SinkError>) -> Self {
        Self(Inner::Ready(result))
    }

    pub fn ok() -> Self {
        Self::ready(Ok(()))
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), SinkError>> + Send + 'static,
    {
        Self(Inner::Pending(Box::pin(future)))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.0, Inner::Ready(_))
    }

    /// The result if already resolved, otherwise the completion back
    pub fn try_resolve(self) -> Result<Result<(), SinkError>, Self> {
        match self.0 {
            Inner::Ready(result) => Ok(result),
            pending => Err(Self(pending)),
        }
    }

    pub async fn wait(self) -> Result<(), SinkError> {
        match self.0 {
            Inner::Ready(result) => result,
            Inner::Pending(future) => future.await,
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Inner::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Inner::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A destination for records that survived the pipeline
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    /// Least severe level this sink writes
    fn level(&self) -> Level;

    fn is_silent(&self) -> bool {
        false
    }

    fn accepts(&self, level: Level) -> bool {
        !self.is_silent() && level.is_at_least_as_severe_as(self.level())
    }

    fn accept(&self, record: &LogRecord) -> Completion;

    /// Resolves once everything accepted so far has been written
    fn flush(&self) -> Completion;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Level);

    impl Sink for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn level(&self) -> Level {
            self.0
        }

        fn accept(&self, _record: &LogRecord) -> Completion {
            Completion::ok()
        }

        fn flush(&self) -> Completion {
            Completion::ok()
        }
    }

    #[test]
    fn test_accepts_by_threshold() {
        let sink = Fixed(Level::Warn);
        assert!(sink.accepts(Level::Fatal));
        assert!(sink.accepts(Level::Warn));
        assert!(!sink.accepts(Level::Info));
    }

    #[tokio::test]
    async fn test_completion_variants() {
        assert!(Completion::ok().is_ready());
        assert!(Completion::ok().wait().await.is_ok());

        let pending = Completion::pending(async { Err(SinkError::Delivery(DispatchError::Closed)) });
        assert!(!pending.is_ready());
        assert!(matches!(
            pending.wait().await,
            Err(SinkError::Delivery(DispatchError::Closed))
        ));
    }
}
