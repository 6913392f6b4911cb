//! Shared test helpers

use std::cell::RefCell;
use std::sync::Once;

use log::{Level, Log, Metadata, Record};

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Logger that keeps records per test thread
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        RECORDS.with(|records| {
            records
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Run `f` and return the log records it emitted on this thread
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<(Level, String)>) {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);
    });

    RECORDS.with(|records| records.borrow_mut().clear());
    let result = f();
    let records = RECORDS.with(|records| records.take());
    (result, records)
}

/// Records at exactly `level`
pub fn at_level(records: &[(Level, String)], level: Level) -> Vec<&str> {
    records
        .iter()
        .filter(|(l, _)| *l == level)
        .map(|(_, message)| message.as_str())
        .collect()
}
