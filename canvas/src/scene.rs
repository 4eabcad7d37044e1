//! Replay of committed history into the visible canvas.
//!
//! The scene is what a renderer would paint, in paint order. It is rebuilt
//! from scratch from the active operations every time the mirror changes;
//! nothing is patched incrementally, so the result depends only on the
//! active sequence and its order.

use crate::doc::{Operation, OperationBody, OperationId, StrokeData};

/// One stroke that survives replay, tagged with the operation that made it.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneStroke {
    pub operation_id: OperationId,
    pub stroke: StrokeData,
}

/// Visible canvas content in paint order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub strokes: Vec<SceneStroke>,
}

impl Scene {
    #[must_use]
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

/// Replay operations in order, skipping undone ones. A clear wipes every
/// stroke painted before it.
pub fn replay<'a>(operations: impl IntoIterator<Item = &'a Operation>) -> Scene {
    let mut scene = Scene::default();
    for op in operations.into_iter().filter(|op| op.is_active()) {
        match &op.body {
            OperationBody::Stroke(stroke) => {
                scene
                    .strokes
                    .push(SceneStroke { operation_id: op.id, stroke: stroke.clone() });
            }
            OperationBody::Clear => scene.strokes.clear(),
        }
    }
    scene
}
