//! Logging system for the RayForge engine
//!
//! This module provides a flexible logging system with:
//! - Customizable logger via Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default
//! - File and line information for detailed ERROR logs
//!
//! There is no global logger. Every component receives a [`Diagnostics`]
//! handle at construction time and logs through it, so two components
//! (or two test fixtures) can use completely different sinks.

use colored::*;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// Implement this trait to create custom loggers (file logging, network logging, etc.)
///
/// # Example
///
/// ```no_run
/// use rayforge_engine::rayforge::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    ///
    /// # Arguments
    ///
    /// * `entry` - The log entry to process
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level (Trace, Debug, Info, Warn, Error)
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source component (e.g., "rayforge::ResourceManager", "rayforge::vulkan")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    /// Very verbose debug information (typically disabled in release)
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages
    Info,

    /// Warning messages (potential issues)
    Warn,

    /// Error messages (critical issues with file:line details)
    Error,
}

/// Default logger implementation using colored console output
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        // Format timestamp as YYYY-MM-DD HH:MM:SS.mmm
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            println!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp,
                severity_str,
                source,
                entry.message,
                file,
                line
            );
        } else {
            println!(
                "[{}] [{}] [{}] {}",
                timestamp,
                severity_str,
                source,
                entry.message
            );
        }
    }
}

/// Logger that discards everything
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _entry: &LogEntry) {}
}

/// Logger that keeps every entry in memory
///
/// Used by tests to assert on the structured messages emitted by failing
/// operations.
#[derive(Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of recorded entries with the given severity
    pub fn count(&self, severity: LogSeverity) -> usize {
        self.entries
            .lock()
            .map(|e| e.iter().filter(|entry| entry.severity == severity).count())
            .unwrap_or(0)
    }

    /// True if any entry of the given severity contains `needle`
    pub fn contains(&self, severity: LogSeverity, needle: &str) -> bool {
        self.entries
            .lock()
            .map(|e| e.iter().any(|entry| entry.severity == severity && entry.message.contains(needle)))
            .unwrap_or(false)
    }
}

impl Logger for MemoryLogger {
    fn log(&self, entry: &LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
    }
}

// ===== DIAGNOSTICS HANDLE =====

/// Injected logging handle
///
/// Cheap to clone. Entries below `min_severity` are dropped before they
/// reach the logger.
#[derive(Clone)]
pub struct Diagnostics {
    logger: Arc<dyn Logger>,
    min_severity: LogSeverity,
}

impl Diagnostics {
    /// Wrap a logger, forwarding every severity
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            min_severity: LogSeverity::Trace,
        }
    }

    /// Colored console output, Info and above
    pub fn console() -> Self {
        Self::new(Arc::new(DefaultLogger)).with_min_severity(LogSeverity::Info)
    }

    /// Discard all output
    pub fn silent() -> Self {
        Self::new(Arc::new(NullLogger))
    }

    /// Set the minimum severity forwarded to the logger
    pub fn with_min_severity(mut self, severity: LogSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn min_severity(&self) -> LogSeverity {
        self.min_severity
    }

    /// Log a message (internal use by the rf_* macros)
    pub fn log(&self, severity: LogSeverity, source: &str, message: String) {
        if severity < self.min_severity {
            return;
        }
        self.logger.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }

    /// Log a message with file:line information (internal use by rf_error!)
    pub fn log_detailed(
        &self,
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if severity < self.min_severity {
            return;
        }
        self.logger.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (very verbose, typically disabled)
///
/// # Example
///
/// ```ignore
/// rf_trace!(self.diagnostics, "rayforge::ResourceManager", "Entering function foo()");
/// ```
#[macro_export]
macro_rules! rf_trace {
    ($diag:expr, $source:expr, $($arg:tt)*) => {
        $diag.log(
            $crate::rayforge::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message (development information)
#[macro_export]
macro_rules! rf_debug {
    ($diag:expr, $source:expr, $($arg:tt)*) => {
        $diag.log(
            $crate::rayforge::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message (important events)
#[macro_export]
macro_rules! rf_info {
    ($diag:expr, $source:expr, $($arg:tt)*) => {
        $diag.log(
            $crate::rayforge::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message (potential issues)
#[macro_export]
macro_rules! rf_warn {
    ($diag:expr, $source:expr, $($arg:tt)*) => {
        $diag.log(
            $crate::rayforge::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
#[macro_export]
macro_rules! rf_error {
    ($diag:expr, $source:expr, $($arg:tt)*) => {
        $diag.log_detailed(
            $crate::rayforge::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR and evaluate to an `Error` of the given message-carrying variant
///
/// # Example
///
/// ```ignore
/// let index = find().ok_or_else(|| rf_err!(diag, AllocationFailed, SOURCE, "no memory type"))?;
/// ```
#[macro_export]
macro_rules! rf_err {
    ($diag:expr, $variant:ident, $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $diag.log_detailed(
            $crate::rayforge::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::rayforge::Error::$variant(message)
    }};
}

/// Log an ERROR and return `Err` of the given message-carrying variant
#[macro_export]
macro_rules! rf_bail {
    ($diag:expr, $variant:ident, $source:expr, $($arg:tt)*) => {
        return Err($crate::rf_err!($diag, $variant, $source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
