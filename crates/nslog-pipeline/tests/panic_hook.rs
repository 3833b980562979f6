use std::panic;
use std::sync::Arc;

use parking_lot::Mutex;

use nslog_pipeline::sink::MemorySink;
use nslog_pipeline::{
    FatalExit, FilterStage, Level, Logger, Pipeline, ShutdownCoordinator, ShutdownState, install_panic_hook,
};

// The hook is process-wide, so this binary holds a single test.
#[test]
fn test_panics_become_fatal_records_and_exit_codes() {
    let codes = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&codes);
    let coordinator = Arc::new(ShutdownCoordinator::with_terminator(Arc::new(move |code| {
        recorded.lock().push(code)
    })));

    let memory = MemorySink::new(8);
    let filter = FilterStage::new("*", Level::Debug, ":").unwrap();
    let logger = Logger::with_coordinator(
        Pipeline::new(Level::Info, ":", filter, Vec::new()),
        vec![Arc::new(memory.clone())],
        Arc::clone(&coordinator),
    );

    install_panic_hook(logger.child("worker"), Arc::clone(&coordinator));

    let result = std::thread::spawn(|| {
        panic::panic_any(FatalExit(5));
    })
    .join();
    assert!(result.is_err());

    let records = memory.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, Level::Fatal);
    assert_eq!(records[0].namespace.as_deref(), Some("worker"));
    assert_eq!(records[0].errors[0].name, "Panic");
    assert_eq!(records[0].errors[0].message, "fatal exit with code 5");
    assert_eq!(*codes.lock(), vec![5]);
    assert_eq!(coordinator.state(), ShutdownState::Terminated);

    // a second panic is still logged, but the exit already happened
    let _ = std::thread::spawn(|| {
        panic!("late");
    })
    .join();
    assert_eq!(memory.len(), 2);
    assert_eq!(memory.records()[1].errors[0].message, "late");
    assert_eq!(*codes.lock(), vec![5]);

    let _ = panic::take_hook();
}
