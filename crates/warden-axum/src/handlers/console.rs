//! Console handlers: buffered history and the bidirectional WebSocket.
//!
//! ## WebSocket protocol
//!
//! | Direction | Type | Content |
//! |---|---|---|
//! | Server → Client | Text | `PanelEvent` JSON, first frame is the current state |
//! | Client → Server | Text | One console command per frame |

use axum::Json;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use warden_core::OutputEvent;

use crate::state::AppState;

/// Recent console lines, oldest first.
pub async fn history(State(state): State<AppState>) -> Json<Vec<OutputEvent>> {
    Json(state.supervisor.events().history())
}

/// `GET /api/console/ws` - WebSocket upgrade endpoint for the live console.
pub async fn console_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_console_ws(socket, state))
}

async fn handle_console_ws(socket: WebSocket, state: AppState) {
    // Subscribe before splitting so nothing published during setup is lost.
    let mut subscription = state.supervisor.subscribe();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    info!("Console WebSocket opened");

    // Egress: bus events → JSON text frames
    let mut egress = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize console event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Ingest: text frames → console commands
    let supervisor = state.supervisor.clone();
    let mut ingest = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let command = text.as_str().trim();
                    if command.is_empty() {
                        continue;
                    }
                    let outcome = supervisor.send_command(command).await;
                    debug!(delivered = outcome.delivered, "Console command from WebSocket");
                }
                Ok(Message::Close(_)) | Err(_) => break,
                // Ignore binary and ping/pong frames.
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut ingest => { egress.abort(); }
        _ = &mut egress => { ingest.abort(); }
    }

    info!("Console WebSocket closed");
}
