//! Process-fatal conditions: panics and failed supervised tasks

use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::error;

use nslog_types::{ErrorValue, Level, Value};

use crate::logger::Logger;
use crate::shutdown::ShutdownCoordinator;

/// Exit code used when a fatal condition does not carry one
pub const FATAL_EXIT_CODE: i32 = 1;

/// Panic payload choosing the process exit code.
///
/// `std::panic::panic_any(FatalExit(3))` logs a fatal record and exits with
/// code 3 once the sinks are drained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FatalExit(pub i32);

/// Exit code requested by a panic payload
pub fn panic_exit_code(payload: &(dyn Any + Send)) -> i32 {
    payload
        .downcast_ref::<FatalExit>()
        .map_or(FATAL_EXIT_CODE, |exit| exit.0)
}

/// Message carried by a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(exit) = payload.downcast_ref::<FatalExit>() {
        format!("fatal exit with code {}", exit.0)
    } else {
        "Box<dyn Any>".to_string()
    }
}

fn panic_error(info: &PanicHookInfo<'_>) -> ErrorValue {
    let message = panic_message(info.payload());
    let mut stack = format!("Panic: {}", message);
    if let Some(location) = info.location() {
        stack.push_str(&format!("\n    at {}", location));
    }
    stack.push('\n');
    stack.push_str(&Backtrace::force_capture().to_string());

    ErrorValue::new("Panic", message).with_stack(stack)
}

/// Turn panics into fatal records followed by a graceful exit.
///
/// The panicking thread logs the record, then blocks while `coordinator`
/// drains the sinks on a dedicated thread. If an exit is already in progress
/// the panic unwinds as usual.
pub fn install_panic_hook(logger: Logger, coordinator: Arc<ShutdownCoordinator>) {
    panic::set_hook(Box::new(move |info| {
        let code = panic_exit_code(info.payload());
        let err = panic_error(info);
        error!(code, message = %err.message, "panic, exiting");

        drop(logger.submit(logger.record(Level::Fatal, "", vec![Value::from(err)])));

        let coordinator = Arc::clone(&coordinator);
        let exit = std::thread::spawn(move || {
            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    runtime.block_on(coordinator.request_exit(code));
                }
                Err(e) => {
                    error!(error = %e, "no runtime to drain sinks, exiting now");
                    coordinator.force_exit(code, || {});
                }
            }
        });
        let _ = exit.join();
    }));
}

/// Build the fatal error for a failed supervised task
pub fn unhandled_rejection(reason: &(dyn StdError + 'static)) -> ErrorValue {
    let mut cause = ErrorValue::from_error(reason);
    cause.name = "Error".to_string();

    ErrorValue::new("UnhandledRejectionError", format!("Unhandled rejection: {}", reason))
        .with_cause(cause)
}

/// Spawn `future`; an `Err` is logged as fatal and exits with code 1
pub fn supervise<F, T, E>(logger: Logger, coordinator: Arc<ShutdownCoordinator>, future: F) -> JoinHandle<Option<T>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<Box<dyn StdError + Send + Sync>> + Send + 'static,
{
    tokio::spawn(async move {
        match future.await {
            Ok(value) => Some(value),
            Err(reason) => {
                let reason: Box<dyn StdError + Send + Sync> = reason.into();
                let err = unhandled_rejection(reason.as_ref());
                error!(error = %err.message, "supervised task failed, exiting");

                drop(logger.submit(logger.record(Level::Fatal, "", vec![Value::from(err)])));
                coordinator.request_exit(FATAL_EXIT_CODE).await;
                None
            }
        }
    })
}
