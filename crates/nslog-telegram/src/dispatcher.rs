use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chunk::{MAX_CHUNK_LEN, split_chunks};
use crate::client::ChatTransport;
use crate::error::{DeliveryError, DispatchError};
use crate::limiter::{LimiterConfig, RateLimiter};

/// Dispatcher settings
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    pub limiter: LimiterConfig,
    pub max_chunk_len: usize,

    /// Jobs waiting for the worker; further jobs are rejected
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            limiter: LimiterConfig::default(),
            max_chunk_len: MAX_CHUNK_LEN,
            queue_capacity: 1024,
        }
    }
}

/// Outcome of a fully delivered job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    pub job_id: u64,
    pub chunks: usize,
}

/// Observable dispatcher activity
#[derive(Clone, Debug)]
pub enum DispatchEvent {
    /// Every chunk of the job was accepted by the remote side
    Delivered { job_id: u64, chunks: usize },

    /// A chunk failed; the rest of its job was skipped
    Failed {
        job_id: u64,
        chunk_index: usize,
        chunk: String,
        error: Arc<DeliveryError>,
    },

    /// The job never entered the queue
    Rejected { job_id: u64, reason: DispatchError },
}

type JobResult = Result<DeliveryReport, DispatchError>;

struct Job {
    id: u64,
    chunks: Vec<String>,
    done: oneshot::Sender<JobResult>,
}

enum Command {
    Send(Job),
    Flush(oneshot::Sender<()>),
}

/// Ordered, rate-limited delivery of chunked messages.
///
/// A single worker task owns the limiter and handles one job at a time, so
/// chunk order within a job and job order across jobs are both preserved.
pub struct Dispatcher {
    queue: mpsc::Sender<Command>,
    events: broadcast::Sender<DispatchEvent>,
    next_id: AtomicU64,
    max_chunk_len: usize,
    closing: CancellationToken,
    stopped: CancellationToken,
}

impl Dispatcher {
    /// Start the worker on a dedicated thread with its own runtime.
    ///
    /// The worker keeps delivering even while every thread of the caller's
    /// runtime is blocked, as the panic hook does while it drains sinks.
    pub fn spawn<T>(transport: T, config: DispatcherConfig) -> Result<Self, DispatchError>
    where
        T: ChatTransport + 'static,
    {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DispatchError::Config(format!("failed to build worker runtime: {e}")))?;

        let (dispatcher, worker) = Self::build(transport, config);
        std::thread::Builder::new()
            .name("nslog-telegram".into())
            .spawn(move || runtime.block_on(worker))
            .map_err(|e| DispatchError::Config(format!("failed to start worker thread: {e}")))?;

        Ok(dispatcher)
    }

    /// Start the worker as a task on `runtime`.
    ///
    /// A worker on a current-thread runtime stalls whenever that thread
    /// blocks, so a panic there cannot be drained to the chat.
    pub fn spawn_on<T>(transport: T, config: DispatcherConfig, runtime: &Handle) -> Result<Self, DispatchError>
    where
        T: ChatTransport + 'static,
    {
        config.validate()?;

        let (dispatcher, worker) = Self::build(transport, config);
        runtime.spawn(worker);
        Ok(dispatcher)
    }

    fn build<T>(transport: T, config: DispatcherConfig) -> (Self, impl Future<Output = ()> + Send + 'static)
    where
        T: ChatTransport + 'static,
    {
        let (queue, rx) = mpsc::channel(config.queue_capacity);
        let (events, _) = broadcast::channel(256);
        let closing = CancellationToken::new();
        let stopped = CancellationToken::new();

        let worker = Worker {
            transport,
            limiter: RateLimiter::new(config.limiter),
            events: events.clone(),
            closing: closing.clone(),
            stopped: stopped.clone(),
        };

        let dispatcher = Self {
            queue,
            events,
            next_id: AtomicU64::new(1),
            max_chunk_len: config.max_chunk_len,
            closing,
            stopped,
        };
        (dispatcher, worker.run(rx))
    }

    /// Subscribe to delivery events
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// Queue `text` for delivery without waiting.
    ///
    /// The returned receiver resolves when the job completes or fails. A
    /// dropped sender (dispatcher closed mid-job) reads as
    /// [`DispatchError::Closed`] through [`Dispatcher::outcome`].
    pub fn dispatch(&self, text: &str) -> oneshot::Receiver<JobResult> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (done, receiver) = oneshot::channel();
        let job = Job {
            id,
            chunks: split_chunks(text, self.max_chunk_len),
            done,
        };

        let sent = if self.is_closed() {
            Err(TrySendError::Closed(Command::Send(job)))
        } else {
            self.queue.try_send(Command::Send(job))
        };

        if let Err(err) = sent {
            let reason = match &err {
                TrySendError::Full(_) => DispatchError::QueueFull,
                TrySendError::Closed(_) => DispatchError::Closed,
            };
            warn!(job_id = id, %reason, "telegram message dropped");
            let _ = self.events.send(DispatchEvent::Rejected {
                job_id: id,
                reason: reason.clone(),
            });
            if let Command::Send(job) = err.into_inner() {
                let _ = job.done.send(Err(reason));
            }
        }

        receiver
    }

    /// Await a receiver returned by [`Dispatcher::dispatch`]
    pub async fn outcome(receiver: oneshot::Receiver<JobResult>) -> JobResult {
        receiver.await.unwrap_or(Err(DispatchError::Closed))
    }

    /// Wait until every job queued before this call has finished.
    ///
    /// After [`Dispatcher::close`] this waits for the worker to drain.
    pub async fn flush(&self) -> Result<(), DispatchError> {
        if !self.is_closed() {
            let (ack, done) = oneshot::channel();
            if self.queue.send(Command::Flush(ack)).await.is_ok() && done.await.is_ok() {
                return Ok(());
            }
        }
        self.stopped.cancelled().await;
        Ok(())
    }

    /// Stop accepting jobs; the worker delivers what is queued, then stops
    pub fn close(&self) {
        self.closing.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// True once the worker has exited
    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }
}

impl DispatcherConfig {
    /// Reject settings the worker cannot honour
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.limiter.max_concurrent != 1 {
            return Err(DispatchError::Config(format!(
                "max_concurrent must be 1 to keep messages ordered, got {}",
                self.limiter.max_concurrent
            )));
        }
        if self.queue_capacity == 0 {
            return Err(DispatchError::Config("queue_capacity must be positive".into()));
        }
        if self.max_chunk_len == 0 {
            return Err(DispatchError::Config("max_chunk_len must be positive".into()));
        }
        self.limiter.validate()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

struct Worker<T> {
    transport: T,
    limiter: RateLimiter,
    events: broadcast::Sender<DispatchEvent>,
    closing: CancellationToken,
    stopped: CancellationToken,
}

impl<T: ChatTransport> Worker<T> {
    async fn run(self, mut rx: mpsc::Receiver<Command>) {
        // also fires if the runtime drops this task
        let _stopped = self.stopped.clone().drop_guard();
        let mut draining = false;

        loop {
            let command = tokio::select! {
                _ = self.closing.cancelled(), if !draining => {
                    debug!("telegram dispatcher closing, draining queue");
                    rx.close();
                    draining = true;
                    continue;
                }
                command = rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
                Command::Send(job) => {
                    let result = self.deliver(&job).await;
                    let _ = job.done.send(result);
                }
            }
        }

        debug!("telegram dispatcher stopped");
    }

    async fn deliver(&self, job: &Job) -> JobResult {
        for (index, chunk) in job.chunks.iter().enumerate() {
            let _permit = self.limiter.acquire().await?;
            debug!(job_id = job.id, chunk = index, len = chunk.len(), "dispatching chunk");

            if let Err(error) = self.transport.send(chunk).await {
                warn!(job_id = job.id, chunk = index, %error, "telegram delivery failed");
                let message = error.to_string();
                let _ = self.events.send(DispatchEvent::Failed {
                    job_id: job.id,
                    chunk_index: index,
                    chunk: chunk.clone(),
                    error: Arc::new(error),
                });
                return Err(DispatchError::Delivery {
                    chunk_index: index,
                    message,
                });
            }
        }

        let _ = self.events.send(DispatchEvent::Delivered {
            job_id: job.id,
            chunks: job.chunks.len(),
        });
        Ok(DeliveryReport {
            job_id: job.id,
            chunks: job.chunks.len(),
        })
    }
}
