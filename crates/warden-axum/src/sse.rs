//! SSE adapter over event bus subscriptions.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{Stream, StreamExt};
use warden_core::PanelEvent;
use warden_runtime::Subscription;

/// Interval between keep-alive comments on idle streams.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Serialize one event into an SSE frame.
///
/// Returns `None` (and logs) if the event cannot be serialized.
pub fn to_sse_event(event: &PanelEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            tracing::warn!("Failed to serialize event: {}", e);
            None
        }
    }
}

/// Stream a subscription to an SSE client.
///
/// The first frame is the current lifecycle state; everything published
/// afterwards follows in order. Includes a keep-alive ping every 30 seconds
/// to prevent proxy timeouts.
pub fn event_stream(
    subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let stream = subscription
        .into_stream()
        .filter_map(|event| async move { to_sse_event(&event).map(Ok) });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
}

#[cfg(test)]
mod tests {
    use warden_core::{OutputEvent, ProcessState};

    use super::*;

    #[test]
    fn test_serializes_every_event_kind() {
        let events = [
            PanelEvent::current_state(ProcessState::Stopped),
            PanelEvent::from(OutputEvent::system("Server starting")),
        ];
        for event in &events {
            assert!(to_sse_event(event).is_some());
        }
    }
}
