//! SSE events handler - real-time event streaming.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures_util::stream::Stream;

use crate::sse::event_stream;
use crate::state::AppState;

/// SSE events stream endpoint.
///
/// The first event is always the current lifecycle state, followed by state
/// changes, console output, telemetry and restart progress as they happen.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    event_stream(state.supervisor.subscribe())
}
