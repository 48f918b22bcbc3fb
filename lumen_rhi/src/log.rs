//! Internal logging system for the Lumen RHI
//!
//! This module provides a small logging facade with:
//! - Customizable logger via Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error, Fatal)
//! - Colored console output by default
//! - File and line information for Error and Fatal logs
//! - Helper macros that log and build an `Error` in one step

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// # Example
///
/// ```no_run
/// use lumen_rhi::lumen::log::{Logger, LogEntry};
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
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source module (e.g., "lumen::PipelineBuilder", "lumen::vulkan")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    /// Very verbose debug information
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages
    Info,

    /// Potential issues, recoverable misuse
    Warn,

    /// Errors (with file:line details)
    Error,

    /// Unrecoverable faults; the process aborts right after logging
    Fatal,
}

impl LogSeverity {
    /// Fixed-width label used by the default logger
    pub fn label(&self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
            LogSeverity::Fatal => "FATAL",
        }
    }
}

/// Default logger implementation using colored console output
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Detailed: `[timestamp] [SEVERITY] [source] message (file:line)`
///
/// Error and Fatal entries go to stderr, everything else to stdout.
pub struct DefaultLogger;

impl DefaultLogger {
    /// Render an entry without color codes
    pub fn format_plain(entry: &LogEntry) -> String {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f");
        match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, entry.severity.label(), entry.source, entry.message, file, line
            ),
            _ => format!(
                "[{}] [{}] [{}] {}",
                timestamp, entry.severity.label(), entry.source, entry.message
            ),
        }
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let label = entry.severity.label();
        let severity_str = match entry.severity {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
            LogSeverity::Fatal => label.white().on_red().bold(),
        };

        let source = entry.source.bright_blue();

        let line = if let (Some(file), Some(line)) = (entry.file, entry.line) {
            format!("[{}] [{}] [{}] {} ({}:{})", timestamp, severity_str, source, entry.message, file, line)
        } else {
            format!("[{}] [{}] [{}] {}", timestamp, severity_str, source, entry.message)
        };

        if entry.severity >= LogSeverity::Error {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message
#[macro_export]
macro_rules! rhi_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Rhi::log(
            $crate::lumen::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
#[macro_export]
macro_rules! rhi_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Rhi::log(
            $crate::lumen::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
///
/// ```no_run
/// lumen_rhi::rhi_info!("lumen::Swapchain", "Rebuilt with {} images", 3);
/// ```
#[macro_export]
macro_rules! rhi_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Rhi::log(
            $crate::lumen::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! rhi_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Rhi::log(
            $crate::lumen::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
#[macro_export]
macro_rules! rhi_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Rhi::log_detailed(
            $crate::lumen::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log a FATAL message with file:line information, then abort the process
#[macro_export]
macro_rules! rhi_fatal {
    ($source:expr, $($arg:tt)*) => {{
        $crate::lumen::Rhi::log_detailed(
            $crate::lumen::log::LogSeverity::Fatal,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        );
        ::std::process::abort()
    }};
}

/// Log an error and evaluate to `Error::BackendError` with the same message
///
/// ```no_run
/// # use lumen_rhi::lumen::Result;
/// # fn f() -> Result<()> {
/// let e = lumen_rhi::rhi_err!("lumen::vulkan", "Failed to map buffer {}", 3);
/// # Err(e) }
/// ```
#[macro_export]
macro_rules! rhi_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::lumen::Rhi::log_detailed(
            $crate::lumen::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::lumen::Error::BackendError(message)
    }};
}

/// Log an error and return `Err(Error::BackendError)` from the enclosing function
#[macro_export]
macro_rules! rhi_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::rhi_err!($source, $($arg)*))
    };
}

/// Log a warning and evaluate to `Error::InvalidState` with the same message
///
/// Used for caller misuse that leaves the object untouched.
#[macro_export]
macro_rules! rhi_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::lumen::Rhi::log(
            $crate::lumen::log::LogSeverity::Warn,
            $source,
            message.clone()
        );
        $crate::lumen::Error::InvalidState(message)
    }};
}

/// Log a warning and return `Err(Error::InvalidState)` from the enclosing function
#[macro_export]
macro_rules! rhi_bail_warn {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::rhi_warn_err!($source, $($arg)*))
    };
}

/// Log a failed native call and evaluate to `Error::Native`
///
/// ```no_run
/// let e = lumen_rhi::rhi_native_err!("lumen::vulkan", "create pipeline layout", -2);
/// assert_eq!(e.native_code(), Some(-2));
/// ```
#[macro_export]
macro_rules! rhi_native_err {
    ($source:expr, $operation:expr, $code:expr) => {{
        let operation: String = ($operation).to_string();
        let code: i32 = $code;
        $crate::lumen::Rhi::log_detailed(
            $crate::lumen::log::LogSeverity::Error,
            $source,
            format!("Failed to {} - native result code {}", operation, code),
            file!(),
            line!()
        );
        $crate::lumen::Error::Native { operation, code }
    }};
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
