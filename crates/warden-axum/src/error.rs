//! Axum-specific error types and mappings.
//!
//! Supervisor and config-store errors become a discriminated JSON body:
//! `{ "error": message, "status": code, "type": kind }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use warden_core::{ConfigError, ErrorKind, SupervisorError};

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Operation not legal in the current lifecycle state.
    #[error("{0}")]
    InvalidTransition(String),

    /// The process could not be spawned.
    #[error("{0}")]
    Launch(String),

    /// Launch configuration is invalid or unreadable.
    #[error("{0}")]
    Configuration(String),

    /// A lifecycle operation ran out of time.
    #[error("{0}")]
    Timeout(String),

    /// A restart stage failed; the process was left stopped.
    #[error("{0}")]
    Protocol(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidTransition(_) => StatusCode::CONFLICT,
            Self::Launch(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Protocol(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::InvalidTransition(_) => Some(ErrorKind::InvalidTransition),
            Self::Launch(_) => Some(ErrorKind::Launch),
            Self::Configuration(_) => Some(ErrorKind::Configuration),
            Self::Timeout(_) => Some(ErrorKind::Timeout),
            Self::Protocol(_) => Some(ErrorKind::ProtocolFailure),
            Self::BadRequest(_) | Self::Internal(_) => None,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
    /// Stable error type discriminant for client-side handling
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    error_type: Option<ErrorKind>,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            status: status.as_u16(),
            error_type: self.kind(),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<SupervisorError> for HttpError {
    fn from(err: SupervisorError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::InvalidTransition => Self::InvalidTransition(message),
            ErrorKind::Launch => Self::Launch(message),
            ErrorKind::Configuration => Self::Configuration(message),
            ErrorKind::Timeout => Self::Timeout(message),
            ErrorKind::ProtocolFailure => Self::Protocol(message),
        }
    }
}

impl From<ConfigError> for HttpError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => Self::Internal(format!("Config storage: {e}")),
            other => Self::Configuration(other.to_string()),
        }
    }
}
