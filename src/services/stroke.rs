//! Stroke assembler — per-author buffers for in-progress strokes.
//!
//! DESIGN
//! ======
//! A stroke arrives as `draw_start`, any number of `draw_move` batches, and
//! `draw_end`. The assembler keeps one staged stroke per author and turns it
//! into an immutable `StrokeData` on commit. It never broadcasts; the caller
//! decides what to relay.
//!
//! A lost `draw_end` is common, so a second `begin` from the same author
//! replaces the stale stroke instead of failing. Strokes abandoned by a
//! disconnected author are reclaimed by `sweep_stale`, which the owning actor
//! runs on an interval shorter than the idle timeout.
//!
//! Points beyond the per-stroke cap are dropped from the front, so memory
//! stays bounded and the visible tail of the stroke stays correct.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use canvas::doc::{ParticipantId, Point, StrokeData, Tool};
use canvas::wire::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StrokeError {
    #[error("author {0} already has a stroke in progress")]
    DuplicateStroke(ParticipantId),
    #[error("author {0} has no stroke in progress")]
    NoActiveStroke(ParticipantId),
    #[error("stroke from {0} has no points")]
    EmptyStroke(ParticipantId),
    #[error("points must be non-empty and finite")]
    InvalidPoints,
}

impl ErrorCode for StrokeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateStroke(_) => "E_DUPLICATE_STROKE",
            Self::NoActiveStroke(_) => "E_NO_ACTIVE_STROKE",
            Self::EmptyStroke(_) => "E_EMPTY_STROKE",
            Self::InvalidPoints => "E_INVALID_POINTS",
        }
    }
}

/// Style fixed at `draw_start` for the whole stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
    pub tool: Tool,
}

/// An uncommitted stroke. Never persisted, never an operation.
#[derive(Debug, Clone)]
pub struct StagedStroke {
    pub points: Vec<Point>,
    pub style: StrokeStyle,
    pub last_activity: Instant,
}

// =============================================================================
// ASSEMBLER
// =============================================================================

pub struct StrokeAssembler {
    staged: HashMap<ParticipantId, StagedStroke>,
    max_points: usize,
}

impl StrokeAssembler {
    #[must_use]
    pub fn new(max_points: usize) -> Self {
        Self { staged: HashMap::new(), max_points: max_points.max(1) }
    }

    /// Open a stroke with its first point. Returns the stroke it displaced
    /// when the author already had one open.
    pub fn begin(&mut self, author_id: ParticipantId, point: Point, style: StrokeStyle, now: Instant) -> Option<StagedStroke> {
        let stroke = StagedStroke { points: vec![point], style, last_activity: now };
        self.staged.insert(author_id, stroke)
    }

    /// Append points to the author's open stroke and refresh its activity
    /// time. Returns how many of the oldest points were dropped by the cap.
    ///
    /// # Errors
    ///
    /// `InvalidPoints` for an empty or non-finite batch, `NoActiveStroke`
    /// when the author has nothing open.
    pub fn extend(&mut self, author_id: ParticipantId, points: &[Point], now: Instant) -> Result<usize, StrokeError> {
        if points.is_empty() || !points.iter().all(|p| p.is_finite()) {
            return Err(StrokeError::InvalidPoints);
        }
        let stroke = self
            .staged
            .get_mut(&author_id)
            .ok_or(StrokeError::NoActiveStroke(author_id))?;

        stroke.points.extend_from_slice(points);
        stroke.last_activity = now;

        let overflow = stroke.points.len().saturating_sub(self.max_points);
        if overflow > 0 {
            stroke.points.drain(..overflow);
        }
        Ok(overflow)
    }

    /// Close the author's stroke and hand back its committed form.
    ///
    /// # Errors
    ///
    /// `NoActiveStroke` when nothing is open; `EmptyStroke` when the staged
    /// stroke has no points (it is discarded).
    pub fn commit(&mut self, author_id: ParticipantId) -> Result<StrokeData, StrokeError> {
        let stroke = self
            .staged
            .remove(&author_id)
            .ok_or(StrokeError::NoActiveStroke(author_id))?;
        if stroke.points.is_empty() {
            return Err(StrokeError::EmptyStroke(author_id));
        }
        Ok(StrokeData {
            points: stroke.points,
            color: stroke.style.color,
            width: stroke.style.width,
            tool: stroke.style.tool,
        })
    }

    /// Drop the author's stroke without committing (author disconnected).
    pub fn abandon(&mut self, author_id: ParticipantId) -> Option<StagedStroke> {
        self.staged.remove(&author_id)
    }

    /// Remove every stroke idle for longer than `timeout`. Returns the
    /// authors whose strokes were dropped.
    pub fn sweep_stale(&mut self, now: Instant, timeout: Duration) -> Vec<ParticipantId> {
        let mut removed = Vec::new();
        self.staged.retain(|author_id, stroke| {
            let idle = now.saturating_duration_since(stroke.last_activity);
            let keep = idle <= timeout;
            if !keep {
                removed.push(*author_id);
            }
            keep
        });
        removed
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_active(&self, author_id: ParticipantId) -> bool {
        self.staged.contains_key(&author_id)
    }

    #[cfg(test)]
    #[must_use]
    pub fn get(&self, author_id: ParticipantId) -> Option<&StagedStroke> {
        self.staged.get(&author_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

#[cfg(test)]
#[path = "stroke_test.rs"]
mod tests;
