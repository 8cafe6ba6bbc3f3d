//! Kernel log sink that prints through semihosting to the debugger console.
//!
//! Semihosting halts the core for every write, so records are kept short
//! and the sink is off unless the `log-semihosting` feature is enabled.

use cortex_m_semihosting::hprintln;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct SemihostingLogger;

static LOGGER: SemihostingLogger = SemihostingLogger;

/// Call this once during early init, before the kernel starts.
pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level);
    Ok(())
}

impl Log for SemihostingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        hprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}
