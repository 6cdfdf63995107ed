//! Unit tests for log.rs
//!
//! Tests Logger trait, LogEntry, LogSeverity, DefaultLogger, MemoryLogger,
//! Diagnostics filtering and the rf_* macros.

use crate::error::Error;
use crate::log::{DefaultLogger, Diagnostics, LogEntry, LogSeverity, Logger, MemoryLogger, NullLogger};
use std::sync::Arc;
use std::time::SystemTime;

fn memory_diagnostics() -> (Arc<MemoryLogger>, Diagnostics) {
    let logger = Arc::new(MemoryLogger::new());
    let diagnostics = Diagnostics::new(logger.clone());
    (logger, diagnostics)
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_creation_with_file_line() {
    let entry = LogEntry {
        severity: LogSeverity::Error,
        timestamp: SystemTime::now(),
        source: "rayforge::vulkan".to_string(),
        message: "vkCreateBuffer failed".to_string(),
        file: Some("vulkan.rs"),
        line: Some(42),
    };

    assert_eq!(entry.severity, LogSeverity::Error);
    assert_eq!(entry.source, "rayforge::vulkan");
    assert_eq!(entry.file, Some("vulkan.rs"));
    assert_eq!(entry.line, Some(42));
}

// ============================================================================
// LOGGER IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_default_logger_does_not_panic() {
    let logger = DefaultLogger;
    logger.log(&LogEntry {
        severity: LogSeverity::Info,
        timestamp: SystemTime::now(),
        source: "test".to_string(),
        message: "plain".to_string(),
        file: None,
        line: None,
    });
    logger.log(&LogEntry {
        severity: LogSeverity::Error,
        timestamp: SystemTime::now(),
        source: "test".to_string(),
        message: "detailed".to_string(),
        file: Some("log_tests.rs"),
        line: Some(1),
    });
}

#[test]
fn test_null_logger_discards() {
    let diagnostics = Diagnostics::new(Arc::new(NullLogger));
    diagnostics.log(LogSeverity::Error, "test", "nothing".to_string());
}

#[test]
fn test_memory_logger_collects_in_order() {
    let (logger, diagnostics) = memory_diagnostics();
    diagnostics.log(LogSeverity::Info, "a", "first".to_string());
    diagnostics.log(LogSeverity::Warn, "b", "second".to_string());

    let entries = logger.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "first");
    assert_eq!(entries[1].source, "b");
    assert_eq!(logger.count(LogSeverity::Warn), 1);
    assert!(logger.contains(LogSeverity::Info, "fir"));
    assert!(!logger.contains(LogSeverity::Error, "first"));
}

// ============================================================================
// DIAGNOSTICS TESTS
// ============================================================================

#[test]
fn test_diagnostics_min_severity_filters() {
    let logger = Arc::new(MemoryLogger::new());
    let diagnostics = Diagnostics::new(logger.clone()).with_min_severity(LogSeverity::Warn);

    diagnostics.log(LogSeverity::Debug, "test", "dropped".to_string());
    diagnostics.log(LogSeverity::Info, "test", "dropped".to_string());
    diagnostics.log(LogSeverity::Warn, "test", "kept".to_string());
    diagnostics.log_detailed(LogSeverity::Error, "test", "kept".to_string(), "x.rs", 3);

    assert_eq!(logger.entries().len(), 2);
    assert_eq!(diagnostics.min_severity(), LogSeverity::Warn);
}

#[test]
fn test_diagnostics_defaults() {
    assert_eq!(Diagnostics::console().min_severity(), LogSeverity::Info);
    assert_eq!(Diagnostics::silent().min_severity(), LogSeverity::Trace);
}

#[test]
fn test_diagnostics_clone_shares_logger() {
    let (logger, diagnostics) = memory_diagnostics();
    let other = diagnostics.clone();
    diagnostics.log(LogSeverity::Info, "a", "one".to_string());
    other.log(LogSeverity::Info, "b", "two".to_string());
    assert_eq!(logger.entries().len(), 2);
}

// ============================================================================
// MACRO TESTS
// ============================================================================

#[test]
fn test_level_macros() {
    let (logger, diagnostics) = memory_diagnostics();
    crate::rf_trace!(diagnostics, "rayforge::test", "trace {}", 1);
    crate::rf_debug!(diagnostics, "rayforge::test", "debug {}", 2);
    crate::rf_info!(diagnostics, "rayforge::test", "info {}", 3);
    crate::rf_warn!(diagnostics, "rayforge::test", "warn {}", 4);
    crate::rf_error!(diagnostics, "rayforge::test", "error {}", 5);

    let entries = logger.entries();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[2].message, "info 3");
    assert!(entries[3].file.is_none());
    assert_eq!(entries[4].severity, LogSeverity::Error);
    assert!(entries[4].file.is_some());
    assert!(entries[4].line.is_some());
}

#[test]
fn test_rf_err_logs_and_builds_error() {
    let (logger, diagnostics) = memory_diagnostics();
    let err = crate::rf_err!(diagnostics, AllocationFailed, "rayforge::test", "type bits {:#x}", 0b101);

    assert_eq!(err, Error::AllocationFailed("type bits 0x5".to_string()));
    assert!(logger.contains(LogSeverity::Error, "type bits 0x5"));
    let entry = &logger.entries()[0];
    assert!(entry.file.is_some_and(|f| f.ends_with("log_tests.rs")));
}

#[test]
fn test_rf_bail_returns_early() {
    fn failing(diagnostics: &Diagnostics, fail: bool) -> crate::error::Result<u32> {
        if fail {
            crate::rf_bail!(diagnostics, InvalidState, "rayforge::test", "wrong phase");
        }
        Ok(7)
    }

    let (logger, diagnostics) = memory_diagnostics();
    assert_eq!(failing(&diagnostics, false), Ok(7));
    assert_eq!(
        failing(&diagnostics, true),
        Err(Error::InvalidState("wrong phase".to_string()))
    );
    assert_eq!(logger.count(LogSeverity::Error), 1);
}
