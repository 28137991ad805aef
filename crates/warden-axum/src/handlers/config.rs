//! Launch configuration handlers.
//!
//! The supervisor reads the configuration once per start, so a saved change
//! takes effect on the next start or restart.

use axum::Json;
use axum::extract::State;
use warden_core::LaunchConfig;

use crate::error::HttpError;
use crate::state::AppState;

/// Current saved launch configuration (defaults when none is saved).
pub async fn get_launch(State(state): State<AppState>) -> Result<Json<LaunchConfig>, HttpError> {
    Ok(Json(state.config_store.load().await?))
}

/// Validate and persist a launch configuration.
pub async fn update_launch(
    State(state): State<AppState>,
    Json(config): Json<LaunchConfig>,
) -> Result<Json<LaunchConfig>, HttpError> {
    state.config_store.save(&config).await?;
    Ok(Json(config))
}
