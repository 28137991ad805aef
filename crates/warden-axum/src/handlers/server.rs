//! Server handlers - lifecycle commands for the managed process.
//!
//! Every outcome is also streamed as console lines and state changes, so a
//! client that misses the HTTP response still sees what happened.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use warden_core::{ProcessState, StatusSnapshot};

use crate::error::HttpError;
use crate::state::AppState;

/// Response for `POST /api/server/start`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub state: ProcessState,
    pub generation: u64,
}

/// Response for `POST /api/server/stop`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub state: ProcessState,
}

/// Request body for `POST /api/server/command`.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

/// Response for `POST /api/server/command`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the command reached the process; commands sent while the
    /// server is not running are echoed to the console but dropped.
    pub delivered: bool,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.supervisor.status().await)
}

pub async fn start(State(state): State<AppState>) -> Result<Json<StartResponse>, HttpError> {
    let generation = state.supervisor.start().await?;
    Ok(Json(StartResponse {
        state: state.supervisor.state(),
        generation,
    }))
}

/// Acknowledge a stop request; the exit is reported on the event stream.
pub async fn stop(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<StopResponse>), HttpError> {
    state.supervisor.request_stop().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StopResponse {
            state: state.supervisor.state(),
        }),
    ))
}

/// Run the full restart protocol and report its outcome.
///
/// The protocol runs on its own task so a client disconnect cannot cancel it
/// between stages.
pub async fn restart(State(state): State<AppState>) -> Result<Json<StatusSnapshot>, HttpError> {
    let supervisor = state.supervisor.clone();
    tokio::spawn(async move { supervisor.restart().await })
        .await
        .map_err(|e| HttpError::Internal(format!("restart task failed: {e}")))??;
    Ok(Json(state.supervisor.status().await))
}

/// Force-kill from any state. Never fails.
pub async fn kill(State(state): State<AppState>) -> Json<StatusSnapshot> {
    state.supervisor.kill().await;
    Json(state.supervisor.status().await)
}

pub async fn command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, HttpError> {
    let command = req.command.trim();
    if command.is_empty() {
        return Err(HttpError::BadRequest("command must not be empty".to_string()));
    }

    let outcome = state.supervisor.send_command(command).await;
    Ok(Json(CommandResponse {
        delivered: outcome.delivered,
    }))
}
