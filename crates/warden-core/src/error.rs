//! Error taxonomy for the lifecycle core.
//!
//! Adapters map these into their own surfaces (HTTP status codes, CLI exit
//! codes). [`ErrorKind`] is the stable discriminant carried across that
//! boundary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{LaunchConfigError, ProcessState, RestartStage};

/// Stable discriminant of a [`SupervisorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidTransition,
    Launch,
    Timeout,
    ProtocolFailure,
    Configuration,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidTransition => "invalid_transition",
            Self::Launch => "launch",
            Self::Timeout => "timeout",
            Self::ProtocolFailure => "protocol_failure",
            Self::Configuration => "configuration",
        }
    }
}

/// Failure to spawn the managed process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Entry artifact not found: {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),
}

/// Errors from the persisted launch configuration store.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] LaunchConfigError),
}

/// Telemetry sampling failure. Always recovered by the poller.
#[derive(Debug, Error)]
#[error("Sampling failed: {0}")]
pub struct SamplingError(pub String);

/// Errors returned by supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Server is not stopped (current state: {0})")]
    AlreadyRunning(ProcessState),

    #[error("Server is already stopped")]
    AlreadyStopped,

    #[error("A restart is already in progress")]
    RestartInProgress,

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Restart failed at stage {stage}: {reason}")]
    Protocol { stage: RestartStage, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SupervisorError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRunning(_) | Self::AlreadyStopped | Self::RestartInProgress => {
                ErrorKind::InvalidTransition
            }
            Self::Launch(_) => ErrorKind::Launch,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Protocol { .. } => ErrorKind::ProtocolFailure,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_kinds() {
        assert_eq!(
            SupervisorError::AlreadyRunning(ProcessState::Running).kind(),
            ErrorKind::InvalidTransition
        );
        assert_eq!(SupervisorError::AlreadyStopped.kind(), ErrorKind::InvalidTransition);
        assert_eq!(SupervisorError::RestartInProgress.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_protocol_failure_message_names_stage() {
        let err = SupervisorError::Protocol {
            stage: RestartStage::Reinitialize,
            reason: "spawn refused".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ProtocolFailure);
        assert_eq!(
            err.to_string(),
            "Restart failed at stage 3 (reinitialize): spawn refused"
        );
    }

    #[test]
    fn test_error_kind_wire_name() {
        let json = serde_json::to_string(&ErrorKind::ProtocolFailure).unwrap();
        assert_eq!(json, "\"protocol_failure\"");
        assert_eq!(ErrorKind::InvalidTransition.as_str(), "invalid_transition");
    }

    #[test]
    fn test_invalid_launch_config_is_a_configuration_error() {
        let err: SupervisorError = ConfigError::from(LaunchConfigError::EmptyArtifact).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: SupervisorError = LaunchError::SpawnFailed("no such file".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Launch);
    }
}
