//! Wire protocol — the message vocabulary between authority and replicas.
//!
//! ARCHITECTURE
//! ============
//! Every WebSocket text frame carries exactly one JSON message, internally
//! tagged by `"type"`. Replicas send [`ClientMessage`]s; the authority sends
//! [`ServerMessage`]s. Inbound messages pass through [`parse_client_message`]
//! once at the gateway, so everything downstream of it can assume coordinates
//! are finite, widths are in range, and colors are well formed.
//!
//! DESIGN
//! ======
//! - `remote_draw_*` messages are live-preview hints. They are never part of
//!   committed state on any replica.
//! - Undo/redo broadcasts carry only the operation id; the full history only
//!   travels in `init` and `canvas_state`.

#[cfg(test)]
#[path = "wire_test.rs"]
mod wire_test;

use serde::{Deserialize, Serialize};

use crate::doc::{Operation, OperationId, Participant, ParticipantId, Point, Tool};
use crate::replica::DEFAULT_HISTORY_CAPACITY;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum number of points accepted in one `draw_move`.
pub const MAX_POINTS_PER_MESSAGE: usize = 1000;

/// Default per-stroke point cap. Beyond it the oldest points are dropped,
/// on the authority and in replica previews alike.
pub const DEFAULT_MAX_STROKE_POINTS: usize = 10_000;

/// Inclusive stroke width bounds.
pub const MIN_STROKE_WIDTH: f64 = 1.0;
pub const MAX_STROKE_WIDTH: f64 = 50.0;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured log lines.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// INBOUND
// =============================================================================

/// Pointer-down that opens a stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawStart {
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub width: f64,
    pub tool: Tool,
}

/// A batch of pointer-move samples for the sender's open stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawMove {
    pub points: Vec<Point>,
}

/// Messages a replica sends to the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    DrawStart(DrawStart),
    DrawMove(DrawMove),
    DrawEnd,
    CursorMove {
        x: f64,
        y: f64,
    },
    Undo {
        #[serde(default)]
        operation_id: Option<OperationId>,
    },
    Redo,
    ClearCanvas,
    /// Ask for a fresh `canvas_state` after the local mirror diverged.
    SyncRequest,
}

impl ClientMessage {
    /// Wire name, used as a log field.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DrawStart(_) => "draw_start",
            Self::DrawMove(_) => "draw_move",
            Self::DrawEnd => "draw_end",
            Self::CursorMove { .. } => "cursor_move",
            Self::Undo { .. } => "undo",
            Self::Redo => "redo",
            Self::ClearCanvas => "clear_canvas",
            Self::SyncRequest => "sync_request",
        }
    }

    /// Check payload constraints that serde's type checks cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::DrawStart(start) => {
                if !Point::new(start.x, start.y).is_finite() {
                    return Err(ValidationError::NonFiniteCoordinate);
                }
                if !(MIN_STROKE_WIDTH..=MAX_STROKE_WIDTH).contains(&start.width) {
                    return Err(ValidationError::WidthOutOfRange(start.width));
                }
                if !is_hex_color(&start.color) {
                    return Err(ValidationError::InvalidColor(start.color.clone()));
                }
                Ok(())
            }
            Self::DrawMove(moves) => {
                let count = moves.points.len();
                if count == 0 || count > MAX_POINTS_PER_MESSAGE {
                    return Err(ValidationError::PointCount(count));
                }
                if !moves.points.iter().all(|p| p.is_finite()) {
                    return Err(ValidationError::NonFiniteCoordinate);
                }
                Ok(())
            }
            Self::CursorMove { x, y } => {
                if Point::new(*x, *y).is_finite() {
                    Ok(())
                } else {
                    Err(ValidationError::NonFiniteCoordinate)
                }
            }
            Self::DrawEnd | Self::Undo { .. } | Self::Redo | Self::ClearCanvas | Self::SyncRequest => Ok(()),
        }
    }
}

/// Why an inbound message was rejected at the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("coordinate is not a finite number")]
    NonFiniteCoordinate,
    #[error("stroke width {0} outside [{MIN_STROKE_WIDTH}, {MAX_STROKE_WIDTH}]")]
    WidthOutOfRange(f64),
    #[error("color {0:?} is not a #RRGGBB code")]
    InvalidColor(String),
    #[error("draw_move carries {0} points (expected 1..={MAX_POINTS_PER_MESSAGE})")]
    PointCount(usize),
}

impl ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_MALFORMED",
            Self::NonFiniteCoordinate => "E_NON_FINITE",
            Self::WidthOutOfRange(_) => "E_WIDTH_RANGE",
            Self::InvalidColor(_) => "E_INVALID_COLOR",
            Self::PointCount(_) => "E_POINT_COUNT",
        }
    }
}

/// Decode and validate one inbound text frame.
///
/// # Errors
///
/// `Malformed` for bad JSON, an unknown `type`, or wrongly typed fields;
/// the specific constraint error otherwise.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ValidationError> {
    let message: ClientMessage =
        serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    message.validate()?;
    Ok(message)
}

/// `#` followed by exactly six hex digits, either case.
#[must_use]
pub fn is_hex_color(color: &str) -> bool {
    let Some(digits) = color.strip_prefix('#') else {
        return false;
    };
    digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Messages the authority sends to replicas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection: who you are plus the full history.
    Init {
        self_id: ParticipantId,
        #[serde(rename = "self")]
        me: Participant,
        history: Vec<Operation>,
        roster: Vec<Participant>,
        /// The authority's retention bound; the mirror evicts in lockstep.
        #[serde(default = "default_history_capacity")]
        history_capacity: usize,
    },
    NewOperation {
        operation: Operation,
    },
    OperationUndone {
        operation_id: OperationId,
    },
    OperationRedone {
        operation_id: OperationId,
    },
    RemoteDrawStart {
        author_id: ParticipantId,
        x: f64,
        y: f64,
        color: String,
        width: f64,
        tool: Tool,
    },
    RemoteDrawMove {
        author_id: ParticipantId,
        points: Vec<Point>,
    },
    RemoteCursor {
        author_id: ParticipantId,
        x: f64,
        y: f64,
    },
    UserJoined {
        participant: Participant,
    },
    UserLeft {
        participant_id: ParticipantId,
    },
    /// Snapshot sent in answer to `sync_request`.
    CanvasState {
        history: Vec<Operation>,
        roster: Vec<Participant>,
    },
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl ServerMessage {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::NewOperation { .. } => "new_operation",
            Self::OperationUndone { .. } => "operation_undone",
            Self::OperationRedone { .. } => "operation_redone",
            Self::RemoteDrawStart { .. } => "remote_draw_start",
            Self::RemoteDrawMove { .. } => "remote_draw_move",
            Self::RemoteCursor { .. } => "remote_cursor",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::CanvasState { .. } => "canvas_state",
        }
    }

    /// Live hints outside committed state. They are not logged per message
    /// and may be dropped for a client that is falling behind.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::RemoteDrawStart { .. } | Self::RemoteDrawMove { .. } | Self::RemoteCursor { .. })
    }
}
