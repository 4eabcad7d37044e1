//! WebSocket gateway — one connection per participant.
//!
//! DESIGN
//! ======
//! The gateway is transport only. Each connection gets a fresh participant id
//! and a bounded outbound queue, registers with the canvas actor, then
//! `select!`s between inbound socket messages and queued server messages.
//! Inbound text is parsed and validated here, once, before it reaches the
//! actor; anything malformed is logged and dropped without a reply.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `join` → actor sends `init` through the outbound queue
//! 2. Client messages → validate → `submit`
//! 3. Queue drains to the socket in order
//! 4. Close or socket error → `leave` → peers get `user_left`
//! 5. Actor drops a lagging client → queue drains and closes → socket closes;
//!    the client reconnects for a fresh `init`

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use canvas::doc::ParticipantId;
use canvas::wire::{ErrorCode, ServerMessage, parse_client_message};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::canvas::CanvasError;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    let (client_tx, mut client_rx) = mpsc::channel::<ServerMessage>(state.config.client_queue_capacity);

    if let Err(e) = state.canvas.join(client_id, client_tx).await {
        warn!(%client_id, code = e.error_code(), "ws: canvas unavailable, closing");
        return;
    }
    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if process_inbound_text(&state, client_id, text.as_str()).await.is_err() {
                            break;
                        }
                    }
                    Message::Binary(_) => debug!(%client_id, "ws: ignoring binary message"),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            maybe_message = client_rx.recv() => {
                let Some(message) = maybe_message else { break };
                if send_message(&mut socket, client_id, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Err(e) = state.canvas.leave(client_id).await {
        debug!(%client_id, code = e.error_code(), "ws: leave after canvas stopped");
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// INBOUND
// =============================================================================

/// Validate one inbound text message and hand it to the canvas actor.
/// Invalid messages are dropped; only a stopped actor is an error.
async fn process_inbound_text(state: &AppState, client_id: ParticipantId, text: &str) -> Result<(), CanvasError> {
    let message = match parse_client_message(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(%client_id, code = e.error_code(), error = %e, "ws: dropped invalid message");
            return Ok(());
        }
    };
    state.canvas.submit(client_id, message).await
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_message(socket: &mut WebSocket, client_id: ParticipantId, message: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: failed to serialize message");
            return Err(());
        }
    };
    if !message.is_ephemeral() {
        debug!(%client_id, kind = message.name(), bytes = json.len(), "ws: send");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
