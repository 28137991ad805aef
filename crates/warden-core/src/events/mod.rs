//! Canonical event union streamed to connected clients.
//!
//! This module is the single source of truth for events published on the
//! event bus and serialized by the SSE and WebSocket handlers.
//!
//! # Wire Format
//!
//! Events are internally tagged with a kebab-case `kind`:
//!
//! ```json
//! { "kind": "state-changed", "state": "running", "previous": "starting", "timestamp": "..." }
//! { "kind": "output", "stream": "stdout", "line": "Done (12.3s)!", "timestamp": "..." }
//! ```

mod output;
mod telemetry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ProcessState, RestartStage};

pub use output::{OutputEvent, StreamKind};
pub use telemetry::{ProcessUsage, TelemetrySnapshot};

/// Every event a subscriber can observe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PanelEvent {
    /// The lifecycle state changed, or the current state for a new subscriber.
    StateChanged {
        state: ProcessState,
        /// Absent on the late-join snapshot.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<ProcessState>,
        timestamp: DateTime<Utc>,
    },

    /// A console line (process output, command echo, or system message).
    Output(OutputEvent),

    /// Periodic host/process resource sample.
    Telemetry(TelemetrySnapshot),

    /// A restart session entered a new stage.
    #[serde(rename = "restart-stage")]
    RestartProgress {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        stage: RestartStage,
        number: u8,
        timestamp: DateTime<Utc>,
    },

    /// A restart session finished with the process running.
    ///
    /// Always published after the `running` state change of the new process.
    RestartCompleted {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        #[serde(rename = "elapsedMs")]
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A restart session failed; the process has been forced to `stopped`.
    RestartFailed {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        stage: RestartStage,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl PanelEvent {
    /// State transition event.
    pub fn state_changed(state: ProcessState, previous: ProcessState) -> Self {
        Self::StateChanged {
            state,
            previous: Some(previous),
            timestamp: Utc::now(),
        }
    }

    /// Current-state event sent first to a newly connected subscriber.
    pub fn current_state(state: ProcessState) -> Self {
        Self::StateChanged {
            state,
            previous: None,
            timestamp: Utc::now(),
        }
    }

    pub fn restart_progress(session_id: Uuid, stage: RestartStage) -> Self {
        Self::RestartProgress {
            session_id,
            stage,
            number: stage.number(),
            timestamp: Utc::now(),
        }
    }

    pub fn restart_completed(session_id: Uuid, elapsed_ms: u64) -> Self {
        Self::RestartCompleted {
            session_id,
            elapsed_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn restart_failed(session_id: Uuid, stage: RestartStage, reason: impl Into<String>) -> Self {
        Self::RestartFailed {
            session_id,
            stage,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    /// Wire name of this event's kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state-changed",
            Self::Output(_) => "output",
            Self::Telemetry(_) => "telemetry",
            Self::RestartProgress { .. } => "restart-stage",
            Self::RestartCompleted { .. } => "restart-completed",
            Self::RestartFailed { .. } => "restart-failed",
        }
    }

    /// The state carried by a `state-changed` event.
    pub const fn as_state(&self) -> Option<ProcessState> {
        match self {
            Self::StateChanged { state, .. } => Some(*state),
            _ => None,
        }
    }
}

impl From<OutputEvent> for PanelEvent {
    fn from(event: OutputEvent) -> Self {
        Self::Output(event)
    }
}

impl From<TelemetrySnapshot> for PanelEvent {
    fn from(snapshot: TelemetrySnapshot) -> Self {
        Self::Telemetry(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_changed_serialization() {
        let event = PanelEvent::state_changed(ProcessState::Running, ProcessState::Starting);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"state-changed\""));
        assert!(json.contains("\"state\":\"running\""));
        assert!(json.contains("\"previous\":\"starting\""));
    }

    #[test]
    fn test_current_state_omits_previous() {
        let json = serde_json::to_string(&PanelEvent::current_state(ProcessState::Stopped)).unwrap();
        assert!(!json.contains("previous"));
    }

    #[test]
    fn test_output_event_is_flattened() {
        let event = PanelEvent::from(OutputEvent::stdout("hello"));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"output\""));
        assert!(json.contains("\"stream\":\"stdout\""));
        assert!(json.contains("\"line\":\"hello\""));

        let parsed: PanelEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_restart_events_use_distinct_kinds() {
        let id = Uuid::new_v4();
        let completed = PanelEvent::restart_completed(id, 1200);
        let failed = PanelEvent::restart_failed(id, RestartStage::Reinitialize, "boom");
        assert_eq!(completed.kind(), "restart-completed");
        assert_eq!(failed.kind(), "restart-failed");

        let json = serde_json::to_string(&PanelEvent::restart_progress(id, RestartStage::Assess))
            .unwrap();
        assert!(json.contains("\"kind\":\"restart-stage\""));
        assert!(json.contains("\"number\":1"));
        assert!(json.contains("\"sessionId\""));
    }
}
