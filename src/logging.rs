//! Route `log` records from the protocol core into defmt.
//!
//! The host-testable modules log through the `log` facade; on target this
//! logger formats each record into a fixed buffer and emits it over RTT.

use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Longest formatted message; the rest is cut off.
const LINE_LEN: usize = 96;

struct DefmtLogger;

static LOGGER: DefmtLogger = DefmtLogger;
static INITIALIZED: AtomicBool = AtomicBool::new(false);

impl Log for DefmtLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let mut line: heapless::String<LINE_LEN> = heapless::String::new();
        let _ = write!(line, "{}", record.args());
        let target = record.target();
        match record.level() {
            Level::Error => defmt::error!("[{=str}] {=str}", target, line.as_str()),
            Level::Warn => defmt::warn!("[{=str}] {=str}", target, line.as_str()),
            Level::Info => defmt::info!("[{=str}] {=str}", target, line.as_str()),
            Level::Debug => defmt::debug!("[{=str}] {=str}", target, line.as_str()),
            Level::Trace => defmt::trace!("[{=str}] {=str}", target, line.as_str()),
        }
    }

    fn flush(&self) {}
}

/// Install the bridge. Later calls are ignored.
pub fn init(level: LevelFilter) {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
