//! Shared types for the hyos log pipeline
//!
//! This crate contains the data structures exchanged between the log server,
//! the container runtime accessor, and polling clients.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Wire Types
// ============================================================================

/// Which source served a log request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    /// Rotating log files on disk
    File,
    /// Container runtime log stream
    Docker,
    /// Neither source had anything to offer
    #[default]
    None,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Docker => "docker",
            Self::None => "none",
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending OAuth device-flow prompt found in the server output
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPrompt {
    pub waiting: bool,
    pub url: Option<String>,
    pub code: Option<String>,
}

impl AuthPrompt {
    /// A prompt that is waiting on the operator
    pub fn pending(url: String, code: String) -> Self {
        Self {
            waiting: true,
            url: Some(url),
            code: Some(code),
        }
    }
}

/// Query parameters of the log endpoint
///
/// The presence of `offset` selects incremental mode. `since` is in epoch
/// milliseconds and only reaches the container runtime fallback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
}

impl LogQuery {
    /// Initial request: the last `tail` lines
    pub fn initial(tail: usize) -> Self {
        Self {
            tail: Some(tail),
            ..Default::default()
        }
    }

    /// Poll request: everything after `offset`
    pub fn poll(offset: usize) -> Self {
        Self {
            offset: Some(offset),
            ..Default::default()
        }
    }

    /// Whether this query asks for lines after a client-held cursor
    pub fn is_incremental(&self) -> bool {
        matches!(self.offset, Some(offset) if offset > 0)
    }
}

/// Body returned by the log endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFetchResponse {
    /// Raw text of the selected line window
    pub logs: String,
    pub auth: AuthPrompt,
    pub source: LogSource,
    /// Server time of the response, epoch milliseconds
    pub timestamp: i64,
    /// Lines in the whole source (authoritative for files, an estimate for docker)
    pub total_lines: usize,
}

// ============================================================================
// Log Types
// ============================================================================

/// Time range for log filtering
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimeRange {
    /// No time restriction
    #[default]
    All,
    LastHour,
    LastDay,
    LastWeek,
}

impl TimeRange {
    /// Width of the window in milliseconds
    pub fn as_millis(&self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::LastHour => Some(60 * 60 * 1000),
            Self::LastDay => Some(24 * 60 * 60 * 1000),
            Self::LastWeek => Some(7 * 24 * 60 * 60 * 1000),
        }
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "hour" | "1h" => Ok(Self::LastHour),
            "day" | "24h" => Ok(Self::LastDay),
            "week" | "7d" => Ok(Self::LastWeek),
            other => Err(format!(
                "unknown time range '{other}' (expected all, hour, day or week)"
            )),
        }
    }
}

/// Log severity level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    Unknown,
}

impl LogLevel {
    /// Parse log level from common formats, including java.util.logging names
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" | "finest" | "finer" => Self::Trace,
            "debug" | "fine" => Self::Debug,
            "info" | "config" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "error" | "severe" => Self::Error,
            "fatal" | "critical" => Self::Fatal,
            _ => Self::Unknown,
        }
    }
}

/// A single structured log entry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// `YYYY/MM/DD` as printed, empty for unstructured lines
    pub date: String,

    /// `HH:MM:SS` as printed, empty for unstructured lines
    pub time: String,

    /// Level word as printed (`INFO`, `WARN`, ...), empty for unstructured lines
    pub level: String,

    /// Bracketed component after the level, if any
    pub component: Option<String>,

    /// Message text, including folded continuation lines
    pub message: String,

    /// Original text, including folded continuation lines
    pub raw: String,

    /// Epoch milliseconds, 0 when the date could not be parsed
    pub timestamp: i64,

    /// Whether continuation lines were folded into this entry
    pub is_multi_line: bool,
}

impl LogEntry {
    /// Create an entry for a line that carries no recognizable header
    pub fn unstructured(line: &str) -> Self {
        Self {
            message: line.to_string(),
            raw: line.to_string(),
            ..Default::default()
        }
    }

    /// Fold a continuation line (stack frame, wrapped message) into this entry
    ///
    /// `raw` is the line as read, `content` the same line without any
    /// runtime-added prefix.
    pub fn fold(&mut self, raw: &str, content: &str) {
        self.raw.push('\n');
        self.raw.push_str(raw);
        self.message.push('\n');
        self.message.push_str(content);
        self.is_multi_line = true;
    }

    /// Detected severity
    pub fn severity(&self) -> LogLevel {
        if self.level.is_empty() {
            LogLevel::Unknown
        } else {
            LogLevel::from_str(&self.level)
        }
    }
}
