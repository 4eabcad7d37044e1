//! Document model: committed operations, stroke payloads, and participants.
//!
//! This module defines the data that flows between the authority and every
//! replica. An [`Operation`] is the unit of committed history; its payload is
//! either a finished stroke ([`StrokeData`]) or a canvas clear. Everything
//! here is plain data with serde derives; the rules about who may mutate what
//! live in the authority's log and in [`crate::replica`].

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a committed operation.
pub type OperationId = Uuid;

/// Unique identifier for a connected participant (one per connection).
pub type ParticipantId = Uuid;

/// A point in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite (no NaN, no infinity).
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Drawing tool used for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Paints `color` along the path.
    Brush,
    /// Removes paint along the path; `color` is carried but not drawn.
    Eraser,
}

/// A finished stroke as stored in the log and on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeData {
    /// Ordered path in canvas coordinates. Never empty once committed.
    pub points: Vec<Point>,
    /// `#RRGGBB` color code.
    pub color: String,
    /// Line width in canvas units.
    pub width: f64,
    pub tool: Tool,
}

/// Discriminant of an operation's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Stroke,
    Clear,
}

/// Payload of an operation. A stroke always carries its data, a clear never
/// carries anything, so the kind and payload cannot disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationBody {
    Stroke(StrokeData),
    Clear,
}

impl OperationBody {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Stroke(_) => OperationKind::Stroke,
            Self::Clear => OperationKind::Clear,
        }
    }
}

/// One committed entry of the shared history.
///
/// Everything except `undone` is fixed at creation. On the authority only the
/// operation log flips `undone`; a replica flips its mirror copy only when the
/// authority tells it to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireOperation", into = "WireOperation")]
pub struct Operation {
    pub id: OperationId,
    pub author_id: ParticipantId,
    pub body: OperationBody,
    /// Milliseconds since the Unix epoch, non-decreasing in log order.
    pub created_at: i64,
    pub undone: bool,
}

impl Operation {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.body.kind()
    }

    /// Stroke payload, if this is a stroke.
    #[must_use]
    pub fn stroke(&self) -> Option<&StrokeData> {
        match &self.body {
            OperationBody::Stroke(data) => Some(data),
            OperationBody::Clear => None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.undone
    }
}

/// Flat wire shape: `kind` plus a nullable `payload`.
#[derive(Serialize, Deserialize)]
struct WireOperation {
    id: OperationId,
    author_id: ParticipantId,
    kind: OperationKind,
    payload: Option<StrokeData>,
    created_at: i64,
    undone: bool,
}

/// Raised when a wire operation's `kind` and `payload` disagree.
#[derive(Debug, thiserror::Error)]
pub enum OperationShapeError {
    #[error("stroke operation {0} has no payload")]
    MissingStroke(OperationId),
    #[error("clear operation {0} carries a payload")]
    UnexpectedPayload(OperationId),
    #[error("stroke operation {0} has no points")]
    EmptyStroke(OperationId),
}

impl TryFrom<WireOperation> for Operation {
    type Error = OperationShapeError;

    fn try_from(wire: WireOperation) -> Result<Self, Self::Error> {
        let body = match (wire.kind, wire.payload) {
            (OperationKind::Stroke, Some(data)) if data.points.is_empty() => {
                return Err(OperationShapeError::EmptyStroke(wire.id));
            }
            (OperationKind::Stroke, Some(data)) => OperationBody::Stroke(data),
            (OperationKind::Stroke, None) => return Err(OperationShapeError::MissingStroke(wire.id)),
            (OperationKind::Clear, None) => OperationBody::Clear,
            (OperationKind::Clear, Some(_)) => return Err(OperationShapeError::UnexpectedPayload(wire.id)),
        };
        Ok(Self { id: wire.id, author_id: wire.author_id, body, created_at: wire.created_at, undone: wire.undone })
    }
}

impl From<Operation> for WireOperation {
    fn from(op: Operation) -> Self {
        let kind = op.kind();
        let payload = match op.body {
            OperationBody::Stroke(data) => Some(data),
            OperationBody::Clear => None,
        };
        Self { id: op.id, author_id: op.author_id, kind, payload, created_at: op.created_at, undone: op.undone }
    }
}

/// A connected participant as listed in the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    /// Display name, e.g. `"User 3"`.
    pub name: String,
    /// `#RRGGBB` cursor/badge color.
    pub color: String,
    pub is_active: bool,
}
