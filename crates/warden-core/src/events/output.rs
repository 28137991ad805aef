//! Console output lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source of a console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Managed process stdout.
    Stdout,
    /// Managed process stderr.
    Stderr,
    /// Lifecycle message produced by the supervisor.
    System,
    /// Echo of a command sent by a client.
    Command,
    Error,
    Warning,
}

/// A single console line.
///
/// Ordering is preserved within one stream; stdout and stderr may interleave
/// arbitrarily relative to each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub stream: StreamKind,
    pub line: String,
    pub timestamp: DateTime<Utc>,
}

impl OutputEvent {
    pub fn new(stream: StreamKind, line: impl Into<String>) -> Self {
        Self {
            stream,
            line: line.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn stdout(line: impl Into<String>) -> Self {
        Self::new(StreamKind::Stdout, line)
    }

    pub fn system(line: impl Into<String>) -> Self {
        Self::new(StreamKind::System, line)
    }

    pub fn command(line: impl Into<String>) -> Self {
        Self::new(StreamKind::Command, line)
    }

    pub fn warning(line: impl Into<String>) -> Self {
        Self::new(StreamKind::Warning, line)
    }

    pub fn error(line: impl Into<String>) -> Self {
        Self::new(StreamKind::Error, line)
    }
}
