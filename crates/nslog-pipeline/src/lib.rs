//! Record processing for nslog
//!
//! This crate runs log calls through the stage pipeline (level gate, name,
//! namespace filter, context split, error extraction), renders the surviving
//! records and fans them out to sinks. It also owns graceful shutdown and the
//! process-fatal paths.

mod classify;
mod config;
mod context;
mod fatal;
mod filter;
mod logger;
mod pipeline;
mod shutdown;

pub mod render;
pub mod sink;

pub use classify::ErrorStage;
pub use config::{ConfigError, ConsoleOptions, FileOptions, LoggerOptions, TelegramOptions};
pub use context::ContextStage;
pub use fatal::{
    FATAL_EXIT_CODE, FatalExit, install_panic_hook, panic_exit_code, panic_message, supervise,
    unhandled_rejection,
};
pub use filter::{
    DEFAULT_FILTER, DEFAULT_FILTER_ENV_KEY, FilterError, FilterOptions, FilterStage, FilterSyntax,
    NamespaceMatcher, Pattern,
};
pub use logger::Logger;
pub use pipeline::{LevelGate, NameStage, Pipeline, Stage};
pub use shutdown::{
    DEFAULT_MIN_WAIT, ExitOutcome, ExitTaskId, ShutdownCoordinator, ShutdownState, Terminator,
    register_sink_drain,
};

// Re-export types used in our public API
pub use nslog_telegram::{ChatId, DispatchEvent, Dispatcher, DispatcherConfig, LimiterConfig};
pub use nslog_types::{ErrorValue, Level, LogRecord, Value};
