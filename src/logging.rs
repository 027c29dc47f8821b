//! Logging backend for the `log` facade
//!
//! Library code only uses `log::{error, warn, info, debug}`; the binary
//! installs [`init`] to route records to stderr and, optionally, a file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

/// Verbosity levels, numbered so they can come from a plain integer option
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Nothing = 0,
    User = 1,
    Error = 2,
    Warning = 3,
    Info = 4,
    Debug = 5,
    All = 6,
}

impl LogLevel {
    /// Create a LogLevel from an integer; unknown values mean `Info`.
    pub fn from_i32(level: i32) -> Self {
        match level {
            0 => LogLevel::Nothing,
            1 => LogLevel::User,
            2 => LogLevel::Error,
            3 => LogLevel::Warning,
            4 => LogLevel::Info,
            5 => LogLevel::Debug,
            6 => LogLevel::All,
            _ => LogLevel::Info,
        }
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Nothing => LevelFilter::Off,
            LogLevel::User | LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::All => LevelFilter::Trace,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warning
    }
}

struct PlayerLogger {
    file: Option<Mutex<File>>,
}

impl Log for PlayerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}: {}", record.level(), record.target(), record.args());
        eprintln!("{}", line);
        if let Some(file) = &self.file {
            // Best effort.
            let _ = writeln!(file.lock(), "{}", line);
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Installs the stderr logger at `level`, also appending to `log_file`.
///
/// Only the first call installs a logger; later calls just adjust the level.
pub fn init(level: LogLevel, log_file: Option<&Path>) -> std::io::Result<()> {
    let file = match log_file {
        Some(path) => Some(Mutex::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };
    if log::set_logger(Box::leak(Box::new(PlayerLogger { file }))).is_err() {
        log::debug!("logger already installed");
    }
    log::set_max_level(level.to_level_filter());
    Ok(())
}
