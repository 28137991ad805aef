//! System handlers - host and process telemetry.

use axum::Json;
use axum::extract::State;
use warden_core::TelemetrySnapshot;

use crate::state::AppState;

/// Latest telemetry sample, or `null` before the first successful sample.
pub async fn telemetry(State(state): State<AppState>) -> Json<Option<TelemetrySnapshot>> {
    Json(state.telemetry.borrow().clone())
}
