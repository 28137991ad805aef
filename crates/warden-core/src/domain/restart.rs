//! Restart protocol stages and session metadata.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five stages of a supervised restart, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartStage {
    /// Gracefully stop the process if it is up.
    Assess,
    /// Force-kill anything still attached after a short delay.
    VerifyShutdown,
    /// Launch a fresh process.
    Reinitialize,
    /// Poll until the new process reports ready.
    AwaitReadiness,
    /// Re-check that the process is still running.
    FinalConfirmation,
}

impl RestartStage {
    pub const ALL: [Self; 5] = [
        Self::Assess,
        Self::VerifyShutdown,
        Self::Reinitialize,
        Self::AwaitReadiness,
        Self::FinalConfirmation,
    ];

    /// 1-based stage number.
    pub const fn number(self) -> u8 {
        match self {
            Self::Assess => 1,
            Self::VerifyShutdown => 2,
            Self::Reinitialize => 3,
            Self::AwaitReadiness => 4,
            Self::FinalConfirmation => 5,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Assess => "assess",
            Self::VerifyShutdown => "verify-shutdown",
            Self::Reinitialize => "reinitialize",
            Self::AwaitReadiness => "await-readiness",
            Self::FinalConfirmation => "final-confirmation",
        }
    }
}

impl fmt::Display for RestartStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}

/// Public view of the active restart session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartSessionInfo {
    pub session_id: Uuid,
    pub stage: RestartStage,
    pub started_at: DateTime<Utc>,
    /// Wall-clock point after which the session is considered overdue.
    pub deadline: DateTime<Utc>,
}
