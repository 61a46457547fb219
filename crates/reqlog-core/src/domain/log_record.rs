//! Log records, severity levels and metadata

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Rendered timestamp layout, e.g. `28/08/2024, 14:03:05`
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// Syslog severity level
///
/// Variants are declared from most to least severe, so `Emergency < Debug`
/// under the derived ordering, matching the numeric syslog codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// System is unusable
    Emergency,
    /// Action must be taken immediately
    Alert,
    /// Critical conditions
    Critical,
    /// Error conditions
    Error,
    /// Warning conditions
    Warning,
    /// Normal but significant condition
    Notice,
    /// Informational messages
    Info,
    /// Debug-level messages
    Debug,
}

impl LogLevel {
    pub const ALL: [LogLevel; 8] = [
        LogLevel::Emergency,
        LogLevel::Alert,
        LogLevel::Critical,
        LogLevel::Error,
        LogLevel::Warning,
        LogLevel::Notice,
        LogLevel::Info,
        LogLevel::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// Uppercase label used in rendered lines
    pub fn label(&self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured metadata attached to a record
///
/// Values are snapshotted into JSON when inserted, so a record never holds
/// references into request or response objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, coercing it to its debug string if it cannot serialize
    pub fn insert<T>(&mut self, key: impl Into<String>, value: &T)
    where
        T: Serialize + fmt::Debug + ?Sized,
    {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::debug!("[Metadata] Coercing unserializable value to string: {}", e);
            Value::String(format!("{:?}", value))
        });
        self.0.insert(key.into(), value);
    }

    /// Builder form of [`Metadata::insert`]
    pub fn with<T>(mut self, key: impl Into<String>, value: &T) -> Self
    where
        T: Serialize + fmt::Debug + ?Sized,
    {
        self.insert(key, value);
        self
    }

    /// Attach an error's message and stack
    pub fn with_error(mut self, err: &anyhow::Error) -> Self {
        self.0
            .insert("message".to_string(), Value::String(err.to_string()));
        self.0
            .insert("stack".to_string(), Value::String(error_stack(err)));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

}

/// Render an error as a multi-line stack: the message, its causes and, when
/// one was captured, the backtrace
pub fn error_stack(err: &anyhow::Error) -> String {
    let mut stack = format!("Error: {}", err);
    for cause in err.chain().skip(1) {
        stack.push_str(&format!("\n    caused by: {}", cause));
    }
    let backtrace = err.backtrace();
    if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
        stack.push('\n');
        stack.push_str(&backtrace.to_string());
    }
    stack
}

/// A single log event, created at the call site and dropped once written
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    /// Already rendered with [`TIMESTAMP_FORMAT`]
    pub timestamp: String,
    pub metadata: Metadata,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>, at: DateTime<Local>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            metadata: Metadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}
