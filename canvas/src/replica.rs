//! Replica-side mirror of the authority's operation log.
//!
//! SYSTEM CONTEXT
//! ==============
//! Each participant keeps one `ReplicaState`. It is fed exclusively by
//! [`ServerMessage`]s from the authority and is never authoritative itself:
//! local input is only ever shown as a preview until the authority echoes the
//! committed operation back.
//!
//! DESIGN
//! ======
//! - The mirror is append-only and keeps the authority's order. It applies the
//!   same retention bound as the authority, so the oldest entries fall off in
//!   lockstep and the active set stays identical.
//! - The scene is replayed from scratch after every mirror mutation.
//! - An undo/redo for an id the mirror does not know means the mirror is
//!   stale; [`Applied::Diverged`] tells the caller to send `sync_request`.

#[cfg(test)]
#[path = "replica_test.rs"]
mod replica_test;

use std::collections::{HashMap, VecDeque};

use crate::doc::{Operation, OperationId, Participant, ParticipantId, Point, Tool};
use crate::scene::{Scene, replay};
use crate::wire::{DEFAULT_MAX_STROKE_POINTS, ServerMessage};

/// Default retention bound shared by authority and replicas.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Result of applying one server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The mirror changed and the scene was rebuilt.
    Mirror,
    /// Only previews, cursors, or roster changed.
    Presence,
    /// Already reflected (duplicate delivery); nothing changed.
    Duplicate,
    /// Referenced id is unknown; the mirror is stale and needs a snapshot.
    Diverged(OperationId),
}

/// Live, uncommitted stroke of a remote participant.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewStroke {
    pub points: Vec<Point>,
    pub color: String,
    pub width: f64,
    pub tool: Tool,
}

/// Counters for enabling undo/redo controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaStats {
    pub total: usize,
    pub active: usize,
    pub undone: usize,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Client-local mirror of committed history plus presence overlays.
#[derive(Debug, Clone)]
pub struct ReplicaState {
    self_id: Option<ParticipantId>,
    capacity: usize,
    operations: VecDeque<Operation>,
    roster: Vec<Participant>,
    cursors: HashMap<ParticipantId, Point>,
    previews: HashMap<ParticipantId, PreviewStroke>,
    scene: Scene,
}

impl Default for ReplicaState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicaState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            self_id: None,
            // Replaced by the authority's bound on `init`.
            capacity: DEFAULT_HISTORY_CAPACITY,
            operations: VecDeque::new(),
            roster: Vec::new(),
            cursors: HashMap::new(),
            previews: HashMap::new(),
            scene: Scene::default(),
        }
    }

    /// Apply one message from the authority.
    pub fn apply(&mut self, message: &ServerMessage) -> Applied {
        match message {
            ServerMessage::Init { self_id, history, roster, history_capacity, .. } => {
                self.self_id = Some(*self_id);
                self.capacity = (*history_capacity).max(1);
                self.load_snapshot(history, roster);
                Applied::Mirror
            }
            ServerMessage::CanvasState { history, roster } => {
                self.load_snapshot(history, roster);
                Applied::Mirror
            }
            ServerMessage::NewOperation { operation } => self.push_operation(operation),
            ServerMessage::OperationUndone { operation_id } => self.set_undone(*operation_id, true),
            ServerMessage::OperationRedone { operation_id } => self.set_undone(*operation_id, false),
            ServerMessage::RemoteDrawStart { author_id, x, y, color, width, tool } => {
                self.previews.insert(
                    *author_id,
                    PreviewStroke { points: vec![Point::new(*x, *y)], color: color.clone(), width: *width, tool: *tool },
                );
                Applied::Presence
            }
            ServerMessage::RemoteDrawMove { author_id, points } => {
                // A move without a start (lost or pre-join) has nothing to extend.
                if let Some(preview) = self.previews.get_mut(author_id) {
                    preview.points.extend_from_slice(points);
                    let overflow = preview.points.len().saturating_sub(DEFAULT_MAX_STROKE_POINTS);
                    preview.points.drain(..overflow);
                }
                Applied::Presence
            }
            ServerMessage::RemoteCursor { author_id, x, y } => {
                self.cursors.insert(*author_id, Point::new(*x, *y));
                Applied::Presence
            }
            ServerMessage::UserJoined { participant } => {
                self.roster.retain(|p| p.id != participant.id);
                self.roster.push(participant.clone());
                Applied::Presence
            }
            ServerMessage::UserLeft { participant_id } => {
                self.roster.retain(|p| p.id != *participant_id);
                self.cursors.remove(participant_id);
                self.previews.remove(participant_id);
                Applied::Presence
            }
        }
    }

    fn load_snapshot(&mut self, history: &[Operation], roster: &[Participant]) {
        let skip = history.len().saturating_sub(self.capacity);
        self.operations = history.iter().skip(skip).cloned().collect();
        self.roster = roster.to_vec();
        self.cursors.clear();
        self.previews.clear();
        self.rebuild();
    }

    fn push_operation(&mut self, operation: &Operation) -> Applied {
        // The committed stroke replaces the author's live preview either way.
        self.previews.remove(&operation.author_id);
        if self.operations.iter().any(|op| op.id == operation.id) {
            return Applied::Duplicate;
        }
        self.operations.push_back(operation.clone());
        while self.operations.len() > self.capacity {
            self.operations.pop_front();
        }
        self.rebuild();
        Applied::Mirror
    }

    fn set_undone(&mut self, operation_id: OperationId, undone: bool) -> Applied {
        let Some(op) = self.operations.iter_mut().find(|op| op.id == operation_id) else {
            return Applied::Diverged(operation_id);
        };
        if op.undone == undone {
            return Applied::Duplicate;
        }
        op.undone = undone;
        self.rebuild();
        Applied::Mirror
    }

    fn rebuild(&mut self) {
        self.scene = replay(&self.operations);
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Participant id assigned by the authority in `init`.
    #[must_use]
    pub fn self_id(&self) -> Option<ParticipantId> {
        self.self_id
    }

    /// Mirror contents, active and undone, in history order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Active operations in history order; replaying these yields the scene.
    pub fn active(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.is_active())
    }

    #[must_use]
    pub fn get(&self, id: OperationId) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[must_use]
    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    #[must_use]
    pub fn cursor(&self, participant_id: ParticipantId) -> Option<Point> {
        self.cursors.get(&participant_id).copied()
    }

    #[must_use]
    pub fn preview(&self, participant_id: ParticipantId) -> Option<&PreviewStroke> {
        self.previews.get(&participant_id)
    }

    #[must_use]
    pub fn stats(&self) -> ReplicaStats {
        let total = self.operations.len();
        let active = self.active().count();
        ReplicaStats { total, active, undone: total - active, can_undo: active > 0, can_redo: active < total }
    }
}
