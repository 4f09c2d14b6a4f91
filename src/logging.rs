/// Structured logging for the CUGN analysis pipeline
///
/// Provides context-rich logging tagged with the pipeline stage and the
/// glider line being processed. Supports both console output and an
/// append-only log file for long batch runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::CugnError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = CugnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(CugnError::InvalidArgument(format!("log level '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Grid,
    AnnualCycle,
    Extrema,
    Cluster,
    Io,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Grid => write!(f, "GRID"),
            Stage::AnnualCycle => write!(f, "ANNUAL"),
            Stage::Extrema => write!(f, "EXTREMA"),
            Stage::Cluster => write!(f, "CLUSTER"),
            Stage::Io => write!(f, "IO"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. a line whose files have not been produced yet
    Expected,
    /// Unexpected failure - corrupt inputs or a broken invariant
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut guard) = LOGGER.lock() {
            *guard = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, stage: Stage, line: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let line_part = line.map(|l| format!(" [line {}]", l)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, stage, line_part, message)
    }

    fn log(&self, level: LogLevel, stage: Stage, line: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, stage, line, message);
        let line_part = line.map(|l| format!(" [line {}]", l)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, line_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, line_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, stage: Stage, line: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, line, message);
        }
    }
}

/// Log a general informational message
pub fn info(stage: Stage, line: Option<&str>, message: &str) {
    emit(LogLevel::Info, stage, line, message);
}

/// Log a warning message
pub fn warn(stage: Stage, line: Option<&str>, message: &str) {
    emit(LogLevel::Warning, stage, line, message);
}

/// Log an error message
pub fn error(stage: Stage, line: Option<&str>, message: &str) {
    emit(LogLevel::Error, stage, line, message);
}

/// Log a debug message
pub fn debug(stage: Stage, line: Option<&str>, message: &str) {
    emit(LogLevel::Debug, stage, line, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a pipeline failure by its error kind
pub fn classify_failure(err: &CugnError) -> FailureType {
    match err {
        // Missing files usually mean a line has not been processed yet
        CugnError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => FailureType::Expected,
        CugnError::UnknownLine(_) | CugnError::InvalidArgument(_) => FailureType::Expected,
        // Broken invariants in the data itself
        CugnError::JoinIntegrity(_)
        | CugnError::MalformedTable(_)
        | CugnError::NonFiniteInput { .. }
        | CugnError::ShapeMismatch(_)
        | CugnError::Parse(_) => FailureType::Unexpected,
        _ => FailureType::Unknown,
    }
}

/// Log a pipeline failure with automatic classification
pub fn log_failure(stage: Stage, line: Option<&str>, operation: &str, err: &CugnError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(stage, line, &message),
        FailureType::Unexpected => error(stage, line, &message),
        FailureType::Unknown => warn(stage, line, &message),
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a multi-line batch pass
pub fn log_run_summary(stage: Stage, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Run complete: {}/{} lines successful, {} failed",
        successful, total, failed
    );

    if failed == 0 {
        info(stage, None, &message);
    } else if successful == 0 {
        error(stage, None, &message);
    } else {
        warn(stage, None, &message);
    }
}
