//! Graceful process exit
//!
//! Exit handlers register with a [`ShutdownCoordinator`]. An exit request runs
//! every handler concurrently and terminates the process once they all finish
//! or the wait budget elapses, whichever comes first.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::logger::Logger;

/// Lower bound of the drain budget
pub const DEFAULT_MIN_WAIT: Duration = Duration::from_millis(3000);

type ExitHandler = Arc<dyn Fn(i32) -> BoxFuture<'static, ()> + Send + Sync>;

/// Ends the process with an exit code
pub type Terminator = Arc<dyn Fn(i32) + Send + Sync>;

/// Handle returned by [`ShutdownCoordinator::register`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExitTaskId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownState {
    Idle,
    Draining,
    Terminated,
}

/// How an exit request ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// An exit was already in progress
    Ignored,

    /// No handlers were registered
    Immediate,

    /// Every handler finished within the budget
    Drained,

    /// The budget elapsed first
    TimedOut,
}

struct ExitTask {
    id: ExitTaskId,
    handler: ExitHandler,
    min_wait: Duration,
}

pub struct ShutdownCoordinator {
    state: Mutex<ShutdownState>,
    tasks: Mutex<Vec<ExitTask>>,
    next_id: AtomicU64,
    min_wait: Duration,
    terminator: Terminator,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    /// Coordinator that ends the process with `std::process::exit`
    pub fn new() -> Self {
        Self::with_terminator(Arc::new(|code| std::process::exit(code)))
    }

    pub fn with_terminator(terminator: Terminator) -> Self {
        Self {
            state: Mutex::new(ShutdownState::Idle),
            tasks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            min_wait: DEFAULT_MIN_WAIT,
            terminator,
        }
    }

    /// Override the lower bound of the drain budget
    pub fn with_min_wait(mut self, min_wait: Duration) -> Self {
        self.min_wait = min_wait;
        self
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.lock()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Register an exit handler.
    ///
    /// The handler receives the exit code. `min_wait` raises the drain budget
    /// of every future exit request to at least this long.
    pub fn register<F, Fut>(&self, handler: F, min_wait: Duration) -> ExitTaskId
    where
        F: Fn(i32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = ExitTaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let handler: ExitHandler = Arc::new(move |code| Box::pin(handler(code)));
        self.tasks.lock().push(ExitTask {
            id,
            handler,
            min_wait,
        });
        id
    }

    /// Remove a handler; returns whether it was registered
    pub fn unregister(&self, id: ExitTaskId) -> bool {
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        tasks.len() != before
    }

    /// Run every handler, then terminate with `code`
    pub async fn request_exit(&self, code: i32) -> ExitOutcome {
        {
            let mut state = self.state.lock();
            if *state != ShutdownState::Idle {
                debug!(code, state = ?*state, "exit already in progress");
                return ExitOutcome::Ignored;
            }
            *state = ShutdownState::Draining;
        }

        let (handlers, budget) = {
            let tasks = self.tasks.lock();
            let budget = tasks
                .iter()
                .map(|t| t.min_wait)
                .fold(self.min_wait, Duration::max);
            let handlers: Vec<ExitHandler> = tasks.iter().map(|t| Arc::clone(&t.handler)).collect();
            (handlers, budget)
        };

        if handlers.is_empty() {
            self.terminate(code);
            return ExitOutcome::Immediate;
        }

        debug!(code, handlers = handlers.len(), budget_ms = budget.as_millis() as u64, "draining before exit");
        let drain = join_all(handlers.iter().map(|handler| handler(code)));

        let outcome = tokio::select! {
            _ = drain => ExitOutcome::Drained,
            _ = tokio::time::sleep(budget) => {
                warn!(budget_ms = budget.as_millis() as u64, "exit handlers did not finish in time");
                ExitOutcome::TimedOut
            }
        };

        self.terminate(code);
        outcome
    }

    /// Run `final_record` and terminate at once, whatever the current state
    pub fn force_exit<F: FnOnce()>(&self, code: i32, final_record: F) {
        final_record();
        self.terminate(code);
    }

    fn terminate(&self, code: i32) {
        {
            let mut state = self.state.lock();
            if *state == ShutdownState::Terminated {
                return;
            }
            *state = ShutdownState::Terminated;
        }
        self.tasks.lock().clear();
        (self.terminator)(code);
    }
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("state", &self.state())
            .field("tasks", &self.task_count())
            .field("min_wait", &self.min_wait)
            .finish()
    }
}

/// Register a handler that waits until every sink of `logger` has flushed.
///
/// Flush failures count as finished.
pub fn register_sink_drain(coordinator: &ShutdownCoordinator, logger: &Logger) -> ExitTaskId {
    let sinks = logger.sinks().to_vec();
    coordinator.register(
        move |_code| {
            let flushes: Vec<_> = sinks.iter().map(|sink| (sink.name().to_string(), sink.flush())).collect();
            async move {
                for (name, completion) in flushes {
                    if let Err(err) = completion.wait().await {
                        warn!(sink = %name, error = %err, "sink flush failed during exit");
                    }
                }
            }
        },
        DEFAULT_MIN_WAIT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tokio::time::{Instant, sleep};

    fn recording() -> (ShutdownCoordinator, Arc<Mutex<Vec<i32>>>) {
        let codes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&codes);
        let coordinator = ShutdownCoordinator::with_terminator(Arc::new(move |code| sink.lock().push(code)));
        (coordinator, codes)
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tasks_exits_immediately() {
        let (coordinator, codes) = recording();
        let start = Instant::now();

        assert_eq!(coordinator.request_exit(2).await, ExitOutcome::Immediate);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(*codes.lock(), vec![2]);
        assert_eq!(coordinator.state(), ShutdownState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains_before_budget() {
        let (coordinator, codes) = recording();
        let seen = Arc::new(Mutex::new(None));
        let seen_in = Arc::clone(&seen);
        coordinator.register(
            move |code| {
                let seen = Arc::clone(&seen_in);
                async move {
                    sleep(Duration::from_millis(500)).await;
                    *seen.lock() = Some(code);
                }
            },
            Duration::from_millis(100),
        );

        let start = Instant::now();
        assert_eq!(coordinator.request_exit(0).await, ExitOutcome::Drained);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(*seen.lock(), Some(0));
        assert_eq!(*codes.lock(), vec![0]);
        assert_eq!(coordinator.task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_budget() {
        let (coordinator, codes) = recording();
        coordinator.register(|_| sleep(Duration::from_secs(60)), Duration::from_millis(5000));
        coordinator.register(|_| async {}, Duration::from_millis(10));

        let start = Instant::now();
        assert_eq!(coordinator.request_exit(1).await, ExitOutcome::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_millis(5000));
        assert_eq!(*codes.lock(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_min_wait_is_floor() {
        let (coordinator, _) = recording();
        coordinator.register(|_| sleep(Duration::from_secs(60)), Duration::from_millis(10));

        let start = Instant::now();
        assert_eq!(coordinator.request_exit(1).await, ExitOutcome::TimedOut);
        assert_eq!(start.elapsed(), DEFAULT_MIN_WAIT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentrant_request_is_ignored() {
        let (coordinator, codes) = recording();
        let coordinator = Arc::new(coordinator);
        coordinator.register(|_| sleep(Duration::from_millis(200)), Duration::ZERO);

        let first = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.request_exit(3).await }
        });
        tokio::task::yield_now().await;

        assert_eq!(coordinator.state(), ShutdownState::Draining);
        assert_eq!(coordinator.request_exit(9).await, ExitOutcome::Ignored);
        assert_eq!(first.await.unwrap(), ExitOutcome::Drained);
        assert_eq!(*codes.lock(), vec![3]);

        // terminated is final too
        assert_eq!(coordinator.request_exit(4).await, ExitOutcome::Ignored);
        assert_eq!(*codes.lock(), vec![3]);
    }

    #[test]
    fn test_unregister() {
        let (coordinator, _) = recording();
        let id = coordinator.register(|_| async {}, Duration::ZERO);
        assert_eq!(coordinator.task_count(), 1);
        assert!(coordinator.unregister(id));
        assert!(!coordinator.unregister(id));
        assert_eq!(coordinator.task_count(), 0);
    }

    #[test]
    fn test_force_exit_runs_final_record_once() {
        let (coordinator, codes) = recording();
        let ran = AtomicBool::new(false);

        coordinator.force_exit(7, || ran.store(true, Ordering::SeqCst));
        coordinator.force_exit(8, || {});

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(*codes.lock(), vec![7]);
    }
}
