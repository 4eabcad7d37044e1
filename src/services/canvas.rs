//! Canvas actor — the single serialized owner of the shared canvas.
//!
//! DESIGN
//! ======
//! One task owns the operation log, the stroke assembler, the roster, and
//! every client's outbound queue. WebSocket tasks talk to it only through a
//! bounded command queue ([`CanvasHandle`]), so an append from `draw_end` can
//! never interleave with an undo from another participant. The stale-stroke
//! sweep ticks inside the same `select!` loop and is serialized the same way.
//!
//! Message handlers are pure state transitions that return an `Outcome`;
//! the fan-out step decides who receives what. Outbound sends use
//! `try_send`, so the actor never waits on a slow client.
//!
//! BACKPRESSURE
//! ============
//! A full client queue drops ephemeral hints (`remote_draw_*`,
//! `remote_cursor`) for that client only. Losing anything else would leave
//! its mirror permanently wrong, so the client is disconnected instead:
//! dropping its sender ends the gateway loop, and a reconnect starts over
//! from a fresh `init`.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here is fatal. Assembler mismatches are logged with their error
//! code and dropped; undo/redo with nothing to do is a silent no-op.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use canvas::doc::{OperationBody, ParticipantId, Point};
use canvas::wire::{ClientMessage, ErrorCode, ServerMessage};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::services::history::{LogStats, OperationLog};
use crate::services::roster::Roster;
use crate::services::stroke::{StrokeAssembler, StrokeError, StrokeStyle};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("canvas actor is not running")]
    Closed,
}

impl ErrorCode for CanvasError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Closed => "E_CANVAS_CLOSED",
        }
    }
}

/// Snapshot of actor state for `/api/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanvasStats {
    pub participants: usize,
    pub staged_strokes: usize,
    pub history: LogStats,
}

/// Requests accepted by the actor.
pub enum Command {
    /// Register a connection. The actor answers with `init` on `tx`.
    Join { participant_id: ParticipantId, tx: mpsc::Sender<ServerMessage> },
    /// Connection closed: abandon its stroke and drop it from the roster.
    Leave { participant_id: ParticipantId },
    /// A validated inbound message.
    Message { from: ParticipantId, message: ClientMessage },
    Stats { reply: oneshot::Sender<CanvasStats> },
}

/// Who receives the result of a handled message.
#[derive(Debug, PartialEq)]
enum Outcome {
    /// Every client, including the sender.
    Broadcast(ServerMessage),
    /// Every client except the sender. Used for live hints.
    BroadcastExcludeSender(ServerMessage),
    /// The sender only.
    Reply(ServerMessage),
    /// Nothing to send.
    Ignore,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cheap, cloneable sender side of the actor's command queue.
#[derive(Clone)]
pub struct CanvasHandle {
    tx: mpsc::Sender<Command>,
}

impl CanvasHandle {
    /// # Errors
    ///
    /// `Closed` if the actor has stopped.
    pub async fn join(&self, participant_id: ParticipantId, tx: mpsc::Sender<ServerMessage>) -> Result<(), CanvasError> {
        self.send(Command::Join { participant_id, tx }).await
    }

    /// # Errors
    ///
    /// `Closed` if the actor has stopped.
    pub async fn leave(&self, participant_id: ParticipantId) -> Result<(), CanvasError> {
        self.send(Command::Leave { participant_id }).await
    }

    /// Queue a validated message from `from`.
    ///
    /// # Errors
    ///
    /// `Closed` if the actor has stopped.
    pub async fn submit(&self, from: ParticipantId, message: ClientMessage) -> Result<(), CanvasError> {
        self.send(Command::Message { from, message }).await
    }

    /// # Errors
    ///
    /// `Closed` if the actor has stopped or dropped the reply.
    pub async fn stats(&self) -> Result<CanvasStats, CanvasError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply }).await?;
        rx.await.map_err(|_| CanvasError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), CanvasError> {
        self.tx.send(command).await.map_err(|_| CanvasError::Closed)
    }
}

/// Spawn the canvas actor. The actor stops once every handle is dropped.
#[must_use]
pub fn spawn_canvas_actor(config: &Config) -> (CanvasHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.canvas_queue_capacity);
    let actor = CanvasActor::new(config);
    let sweep_interval = config.stroke_sweep_interval;

    info!(
        history_capacity = config.history_capacity,
        max_stroke_points = config.max_stroke_points,
        idle_timeout_secs = config.stroke_idle_timeout.as_secs(),
        sweep_interval_ms = u64::try_from(sweep_interval.as_millis()).unwrap_or(u64::MAX),
        "canvas actor configured"
    );

    let task = tokio::spawn(actor.run(rx, sweep_interval));
    (CanvasHandle { tx }, task)
}

// =============================================================================
// ACTOR
// =============================================================================

pub struct CanvasActor {
    log: OperationLog,
    strokes: StrokeAssembler,
    roster: Roster,
    clients: HashMap<ParticipantId, mpsc::Sender<ServerMessage>>,
    idle_timeout: Duration,
}

impl CanvasActor {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            log: OperationLog::new(config.history_capacity),
            strokes: StrokeAssembler::new(config.max_stroke_points),
            roster: Roster::new(),
            clients: HashMap::new(),
            idle_timeout: config.stroke_idle_timeout,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>, sweep_interval: Duration) {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_command = rx.recv() => {
                    let Some(command) = maybe_command else { break };
                    self.handle_command(command, Instant::now());
                }
                _ = ticker.tick() => {
                    self.sweep(Instant::now());
                }
            }
        }
        info!("canvas: actor stopped");
    }

    fn handle_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::Join { participant_id, tx } => self.join(participant_id, tx),
            Command::Leave { participant_id } => self.leave(participant_id),
            Command::Message { from, message } => {
                if !self.clients.contains_key(&from) {
                    warn!(%from, kind = message.name(), "canvas: message from unregistered participant");
                    return;
                }
                let outcome = self.handle_message(from, message, now);
                self.deliver(from, outcome);
            }
            Command::Stats { reply } => {
                if reply.send(self.stats()).is_err() {
                    debug!("canvas: stats requester went away");
                }
            }
        }
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    fn join(&mut self, participant_id: ParticipantId, tx: mpsc::Sender<ServerMessage>) {
        let me = self.roster.join(participant_id);
        let init = ServerMessage::Init {
            self_id: participant_id,
            me: me.clone(),
            history: self.log.snapshot(),
            roster: self.roster.list(),
            history_capacity: self.log.capacity(),
        };
        // Init goes out before the client is visible to any broadcast.
        if try_send_logged(participant_id, &tx, init) != Delivery::Sent {
            warn!(%participant_id, "canvas: init not delivered, rejecting join");
            self.roster.leave(participant_id);
            return;
        }
        self.clients.insert(participant_id, tx);

        info!(%participant_id, name = %me.name, participants = self.roster.len(), "canvas: participant joined");
        self.broadcast(&ServerMessage::UserJoined { participant: me }, Some(participant_id));
    }

    fn leave(&mut self, participant_id: ParticipantId) {
        self.clients.remove(&participant_id);
        if self.strokes.abandon(participant_id).is_some() {
            debug!(%participant_id, "canvas: discarded unfinished stroke on leave");
        }
        if self.roster.leave(participant_id).is_some() {
            info!(%participant_id, participants = self.roster.len(), "canvas: participant left");
            self.broadcast(&ServerMessage::UserLeft { participant_id }, None);
        }
    }

    // =========================================================================
    // MESSAGE HANDLERS
    // =========================================================================

    fn handle_message(&mut self, from: ParticipantId, message: ClientMessage, now: Instant) -> Outcome {
        match message {
            ClientMessage::DrawStart(start) => {
                let style = StrokeStyle { color: start.color.clone(), width: start.width, tool: start.tool };
                if self
                    .strokes
                    .begin(from, Point::new(start.x, start.y), style, now)
                    .is_some()
                {
                    let err = StrokeError::DuplicateStroke(from);
                    warn!(%from, code = err.error_code(), "canvas: replaced unfinished stroke");
                }
                Outcome::BroadcastExcludeSender(ServerMessage::RemoteDrawStart {
                    author_id: from,
                    x: start.x,
                    y: start.y,
                    color: start.color,
                    width: start.width,
                    tool: start.tool,
                })
            }
            ClientMessage::DrawMove(moves) => match self.strokes.extend(from, &moves.points, now) {
                Ok(dropped) => {
                    if dropped > 0 {
                        debug!(%from, dropped, "canvas: stroke over point cap, truncated head");
                    }
                    Outcome::BroadcastExcludeSender(ServerMessage::RemoteDrawMove { author_id: from, points: moves.points })
                }
                Err(e) => {
                    warn!(%from, code = e.error_code(), error = %e, "canvas: draw_move dropped");
                    Outcome::Ignore
                }
            },
            ClientMessage::DrawEnd => match self.strokes.commit(from) {
                Ok(stroke) => {
                    let points = stroke.points.len();
                    let operation = self.log.append(from, OperationBody::Stroke(stroke));
                    info!(%from, operation_id = %operation.id, points, "canvas: stroke committed");
                    Outcome::Broadcast(ServerMessage::NewOperation { operation })
                }
                Err(e) => {
                    warn!(%from, code = e.error_code(), error = %e, "canvas: draw_end dropped");
                    Outcome::Ignore
                }
            },
            ClientMessage::CursorMove { x, y } => {
                Outcome::BroadcastExcludeSender(ServerMessage::RemoteCursor { author_id: from, x, y })
            }
            ClientMessage::Undo { operation_id } => match self.log.undo(operation_id) {
                Some(op) => {
                    info!(%from, operation_id = %op.id, "canvas: operation undone");
                    Outcome::Broadcast(ServerMessage::OperationUndone { operation_id: op.id })
                }
                None => {
                    debug!(%from, requested = ?operation_id, "canvas: nothing to undo");
                    Outcome::Ignore
                }
            },
            ClientMessage::Redo => match self.log.redo() {
                Some(op) => {
                    info!(%from, operation_id = %op.id, "canvas: operation redone");
                    Outcome::Broadcast(ServerMessage::OperationRedone { operation_id: op.id })
                }
                None => {
                    debug!(%from, "canvas: nothing to redo");
                    Outcome::Ignore
                }
            },
            ClientMessage::ClearCanvas => {
                let operation = self.log.append(from, OperationBody::Clear);
                info!(%from, operation_id = %operation.id, "canvas: cleared");
                Outcome::Broadcast(ServerMessage::NewOperation { operation })
            }
            ClientMessage::SyncRequest => {
                info!(%from, "canvas: snapshot requested");
                Outcome::Reply(ServerMessage::CanvasState { history: self.log.snapshot(), roster: self.roster.list() })
            }
        }
    }

    // =========================================================================
    // FAN-OUT
    // =========================================================================

    fn deliver(&mut self, from: ParticipantId, outcome: Outcome) {
        match outcome {
            Outcome::Broadcast(message) => self.broadcast(&message, None),
            Outcome::BroadcastExcludeSender(message) => self.broadcast(&message, Some(from)),
            Outcome::Reply(message) => self.send_to(from, message),
            Outcome::Ignore => {}
        }
    }

    fn broadcast(&mut self, message: &ServerMessage, exclude: Option<ParticipantId>) {
        let mut lagging = Vec::new();
        for (client_id, tx) in &self.clients {
            if exclude == Some(*client_id) {
                continue;
            }
            if try_send_logged(*client_id, tx, message.clone()) == Delivery::Lagging {
                lagging.push(*client_id);
            }
        }
        self.disconnect_lagging(lagging);
    }

    fn send_to(&mut self, client_id: ParticipantId, message: ServerMessage) {
        let Some(tx) = self.clients.get(&client_id) else {
            return;
        };
        if try_send_logged(client_id, tx, message) == Delivery::Lagging {
            self.disconnect_lagging(vec![client_id]);
        }
    }

    /// Drop clients that missed an authoritative message. Their `user_left`
    /// goes through `broadcast`, so a cascade is bounded by the client count.
    fn disconnect_lagging(&mut self, lagging: Vec<ParticipantId>) {
        for participant_id in lagging {
            warn!(%participant_id, "canvas: client fell behind, disconnecting");
            self.leave(participant_id);
        }
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    fn sweep(&mut self, now: Instant) {
        for author_id in self.strokes.sweep_stale(now, self.idle_timeout) {
            // Nothing was committed, so nobody is told.
            warn!(%author_id, idle_timeout_secs = self.idle_timeout.as_secs(), "canvas: discarded stale stroke");
        }
    }

    fn stats(&self) -> CanvasStats {
        CanvasStats { participants: self.roster.len(), staged_strokes: self.strokes.len(), history: self.log.stats() }
    }
}

/// What happened to one outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    /// Queue full, ephemeral hint dropped. The client stays.
    Dropped,
    /// Queue full, authoritative message lost. The client must go.
    Lagging,
    /// Receiver gone; the gateway sends `Leave` on its own.
    Closed,
}

fn try_send_logged(client_id: ParticipantId, tx: &mpsc::Sender<ServerMessage>, message: ServerMessage) -> Delivery {
    match tx.try_send(message) {
        Ok(()) => Delivery::Sent,
        Err(mpsc::error::TrySendError::Full(message)) if message.is_ephemeral() => {
            debug!(%client_id, kind = message.name(), "canvas: client queue full, hint dropped");
            Delivery::Dropped
        }
        Err(mpsc::error::TrySendError::Full(message)) => {
            warn!(%client_id, kind = message.name(), "canvas: client queue full, authoritative message lost");
            Delivery::Lagging
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!(%client_id, "canvas: client queue closed");
            Delivery::Closed
        }
    }
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;
