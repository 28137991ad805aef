//! Process lifecycle state and status snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::restart::RestartSessionInfo;

/// Lifecycle state of the managed process.
///
/// Exactly one authoritative value exists per supervisor. The serialized
/// form is the lowercase variant name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// No process attached.
    #[default]
    Stopped,
    /// Process launched, waiting for the ready signature.
    Starting,
    /// Ready signature observed; commands are forwarded.
    Running,
    /// Graceful shutdown requested, force-kill timer armed.
    Stopping,
    /// The handle reported an error or the launch failed.
    Error,
}

impl ProcessState {
    /// States in which a process handle may be attached.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }

    /// Whether `start()` is legal from this state.
    ///
    /// `Error` must be cleared with `stop()` or `kill()` first.
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the supervisor returned by `getStatus()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Current lifecycle state.
    pub state: ProcessState,
    /// OS process id of the attached handle, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Generation of the most recently launched handle (0 before the first start).
    pub generation: u64,
    /// When the attached handle was launched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Seconds since launch of the attached handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
    /// Active restart session, if a restart is in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartSessionInfo>,
}
