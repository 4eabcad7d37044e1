use super::*;
use canvas::doc::{OperationKind, Point, StrokeData, Tool};

fn stroke(x: f64) -> OperationBody {
    OperationBody::Stroke(StrokeData {
        points: vec![Point::new(x, x)],
        color: "#FF0000".into(),
        width: 3.0,
        tool: Tool::Brush,
    })
}

fn active_ids(log: &OperationLog) -> Vec<OperationId> {
    log.active().map(|op| op.id).collect()
}

fn seeded(count: usize) -> (OperationLog, Vec<Operation>) {
    let mut log = OperationLog::new(1000);
    let author = Uuid::new_v4();
    #[allow(clippy::cast_precision_loss)]
    let ops = (0..count).map(|i| log.append(author, stroke(i as f64))).collect();
    (log, ops)
}

// =============================================================================
// append
// =============================================================================

#[test]
fn append_assigns_fresh_active_operation() {
    let mut log = OperationLog::new(10);
    let author = Uuid::new_v4();
    let op = log.append(author, stroke(1.0));

    assert_eq!(op.author_id, author);
    assert_eq!(op.kind(), OperationKind::Stroke);
    assert!(!op.undone);
    assert!(op.created_at > 0);
    assert_eq!(log.len(), 1);
    assert_eq!(log.get(op.id), Some(&op));
}

#[test]
fn append_ids_are_unique_and_timestamps_non_decreasing() {
    let (_, ops) = seeded(50);
    let mut ids: Vec<_> = ops.iter().map(|op| op.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 50);
    assert!(ops.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[test]
fn active_preserves_append_order_minus_undone() {
    let (mut log, ops) = seeded(5);
    log.undo(Some(ops[1].id)).expect("undo op 1");
    log.undo(Some(ops[3].id)).expect("undo op 3");

    assert_eq!(active_ids(&log), vec![ops[0].id, ops[2].id, ops[4].id]);
    let stats = log.stats();
    assert_eq!(stats.total, 5);
    assert_eq!(stats.active, 3);
    assert_eq!(stats.undone, 2);
}

#[test]
fn clear_appends_like_any_operation() {
    let (mut log, _) = seeded(2);
    let clear = log.append(Uuid::new_v4(), OperationBody::Clear);
    assert_eq!(clear.kind(), OperationKind::Clear);
    assert!(clear.stroke().is_none());
    assert_eq!(log.active().last().map(|op| op.id), Some(clear.id));
}

// =============================================================================
// undo
// =============================================================================

#[test]
fn untargeted_undo_walks_newest_first_across_authors() {
    let mut log = OperationLog::new(10);
    let a = log.append(Uuid::new_v4(), stroke(1.0));
    let b = log.append(Uuid::new_v4(), stroke(2.0));
    let c = log.append(Uuid::new_v4(), stroke(3.0));

    assert_eq!(log.undo(None).map(|op| op.id), Some(c.id));
    assert_eq!(log.undo(None).map(|op| op.id), Some(b.id));
    assert_eq!(active_ids(&log), vec![a.id]);
}

#[test]
fn redo_restores_in_lifo_order() {
    let (mut log, ops) = seeded(3);
    log.undo(None);
    log.undo(None);

    let redone = log.redo().expect("redo");
    assert_eq!(redone.id, ops[1].id);
    assert!(!redone.undone);
    assert_eq!(active_ids(&log), vec![ops[0].id, ops[1].id]);
}

#[test]
fn targeted_undo_of_undone_or_unknown_is_noop() {
    let (mut log, ops) = seeded(2);
    assert!(log.undo(Some(ops[0].id)).is_some());
    assert!(log.undo(Some(ops[0].id)).is_none());
    assert!(log.undo(Some(Uuid::new_v4())).is_none());
    assert_eq!(log.stats().undone, 1);
}

#[test]
fn undo_on_empty_or_fully_undone_log_is_none() {
    let mut log = OperationLog::new(10);
    assert!(log.undo(None).is_none());
    assert!(!log.stats().can_undo);

    log.append(Uuid::new_v4(), stroke(0.0));
    log.undo(None);
    assert!(log.undo(None).is_none());
}

#[test]
fn undo_then_redo_restores_identical_active_set() {
    let (mut log, _) = seeded(4);
    let before: Vec<Operation> = log.active().cloned().collect();

    log.undo(None).expect("undo");
    log.redo().expect("redo");

    let after: Vec<Operation> = log.active().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn redo_restores_position_not_redo_order() {
    let (mut log, ops) = seeded(3);
    log.undo(Some(ops[0].id));
    log.undo(Some(ops[2].id));
    log.redo();
    log.redo();
    assert_eq!(active_ids(&log), vec![ops[0].id, ops[1].id, ops[2].id]);
}

#[test]
fn redo_on_empty_stack_is_none() {
    let (mut log, _) = seeded(1);
    assert!(log.redo().is_none());
    assert!(!log.stats().can_redo);
}

// =============================================================================
// redo invalidation
// =============================================================================

#[test]
fn append_after_undo_clears_redo_stack() {
    let (mut log, ops) = seeded(2);
    log.undo(None);
    assert!(log.stats().can_redo);

    log.append(Uuid::new_v4(), stroke(9.0));
    assert!(!log.stats().can_redo);
    assert!(log.redo().is_none());
    // The undone operation stays undone and in history.
    assert!(log.get(ops[1].id).is_some_and(|op| op.undone));

    log.undo(None);
    assert!(log.redo().is_some());
}

// =============================================================================
// retention
// =============================================================================

#[test]
fn eviction_keeps_exactly_capacity_dropping_oldest() {
    let mut log = OperationLog::new(3);
    let author = Uuid::new_v4();
    let ops: Vec<_> = (0..4).map(|i| log.append(author, stroke(f64::from(i)))).collect();

    assert_eq!(log.len(), 3);
    assert_eq!(log.capacity(), 3);
    assert!(log.get(ops[0].id).is_none());
    assert_eq!(active_ids(&log), vec![ops[1].id, ops[2].id, ops[3].id]);
}

#[test]
fn eviction_at_default_capacity() {
    let (log, ops) = seeded(1001);
    assert_eq!(log.len(), 1000);
    assert!(log.get(ops[0].id).is_none());
    assert_eq!(log.snapshot().first().map(|op| op.id), Some(ops[1].id));
}

#[test]
fn redo_never_resurrects_evicted_operation() {
    let mut log = OperationLog::new(2);
    let author = Uuid::new_v4();
    let first = log.append(author, stroke(0.0));
    log.append(author, stroke(1.0));
    log.undo(Some(first.id)).expect("undo oldest");

    // Appending clears the redo stack and evicts `first`.
    log.append(author, stroke(2.0));
    assert!(log.get(first.id).is_none());
    assert!(log.redo().is_none());
    assert_eq!(log.len(), 2);
}

#[test]
fn stale_redo_reference_is_skipped_after_eviction() {
    let mut log = OperationLog::new(2);
    let author = Uuid::new_v4();
    let first = log.append(author, stroke(0.0));
    let second = log.append(author, stroke(1.0));

    // Force a stale reference directly: evict `first` while its sequence
    // number is still on the stack.
    log.undo(Some(first.id));
    log.undo(Some(second.id));
    log.history.pop_front();
    log.index.remove(&first.id);

    assert_eq!(log.redo().map(|op| op.id), Some(second.id));
    assert!(log.redo().is_none());
}

#[test]
fn snapshot_includes_undone_operations() {
    let (mut log, ops) = seeded(3);
    log.undo(Some(ops[1].id));
    let snapshot = log.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot[1].undone);
}

#[test]
fn capacity_of_zero_is_clamped_to_one() {
    let mut log = OperationLog::new(0);
    log.append(Uuid::new_v4(), stroke(0.0));
    let last = log.append(Uuid::new_v4(), stroke(1.0));
    assert_eq!(log.len(), 1);
    assert_eq!(active_ids(&log), vec![last.id]);
}

// =============================================================================
// properties
// =============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Append,
        UndoLatest,
        /// Index into every id ever appended, evicted ones included.
        UndoTarget(usize),
        Redo,
    }

    fn arb_step() -> impl Strategy<Value = Step> {
        prop_oneof![
            3 => Just(Step::Append),
            2 => Just(Step::UndoLatest),
            2 => any::<usize>().prop_map(Step::UndoTarget),
            2 => Just(Step::Redo),
        ]
    }

    /// Plain-vector reference for the ring: (id, undone) in commit order and
    /// a redo stack of ids, most recent last.
    struct Model {
        entries: Vec<(OperationId, bool)>,
        redo: Vec<OperationId>,
        capacity: usize,
    }

    impl Model {
        fn new(capacity: usize) -> Self {
            Self { entries: Vec::new(), redo: Vec::new(), capacity }
        }

        fn append(&mut self, id: OperationId) {
            self.entries.push((id, false));
            self.redo.clear();
            while self.entries.len() > self.capacity {
                self.entries.remove(0);
            }
        }

        fn undo(&mut self, target: Option<OperationId>) -> Option<OperationId> {
            let pos = match target {
                Some(id) => self.entries.iter().position(|(e, undone)| *e == id && !undone)?,
                None => self.entries.iter().rposition(|(_, undone)| !undone)?,
            };
            self.entries[pos].1 = true;
            self.redo.push(self.entries[pos].0);
            Some(self.entries[pos].0)
        }

        fn redo(&mut self) -> Option<OperationId> {
            while let Some(id) = self.redo.pop() {
                if let Some(entry) = self.entries.iter_mut().find(|(e, undone)| *e == id && *undone) {
                    entry.1 = false;
                    return Some(id);
                }
            }
            None
        }

        fn active(&self) -> Vec<OperationId> {
            self.entries.iter().filter(|(_, undone)| !undone).map(|(id, _)| *id).collect()
        }

        fn stats(&self) -> LogStats {
            let total = self.entries.len();
            let active = self.active().len();
            LogStats { total, active, undone: total - active, can_undo: active > 0, can_redo: !self.redo.is_empty() }
        }
    }

    /// Run `steps` against both the log and the model, checking they agree
    /// after every step.
    fn run(capacity: usize, steps: &[Step]) -> Result<(OperationLog, Vec<OperationId>), TestCaseError> {
        let mut log = OperationLog::new(capacity);
        let mut model = Model::new(capacity);
        let mut appended: Vec<OperationId> = Vec::new();
        let author = Uuid::new_v4();

        for step in steps {
            match step {
                Step::Append => {
                    let op = log.append(author, stroke(0.0));
                    model.append(op.id);
                    appended.push(op.id);
                    prop_assert!(!log.stats().can_redo);
                    prop_assert_eq!(log.redo().map(|op| op.id), None);
                }
                Step::UndoLatest => {
                    prop_assert_eq!(log.undo(None).map(|op| op.id), model.undo(None));
                }
                Step::UndoTarget(index) => {
                    let target = if appended.is_empty() { Uuid::new_v4() } else { appended[index % appended.len()] };
                    prop_assert_eq!(log.undo(Some(target)).map(|op| op.id), model.undo(Some(target)));
                }
                Step::Redo => {
                    prop_assert_eq!(log.redo().map(|op| op.id), model.redo());
                }
            }
            prop_assert_eq!(active_ids(&log), model.active());
            prop_assert_eq!(log.stats(), model.stats());
            prop_assert!(log.len() <= capacity);
        }
        Ok((log, appended))
    }

    proptest! {
        #[test]
        fn log_agrees_with_vector_model(
            capacity in 1usize..6,
            steps in prop::collection::vec(arb_step(), 0..60),
        ) {
            run(capacity, &steps)?;
        }

        #[test]
        fn undo_then_redo_restores_active_set(
            capacity in 1usize..6,
            steps in prop::collection::vec(arb_step(), 0..40),
        ) {
            let (mut log, _) = run(capacity, &steps)?;
            let before = active_ids(&log);
            let stats_before = log.stats();

            if let Some(undone) = log.undo(None) {
                let redone = log.redo();
                prop_assert_eq!(redone.map(|op| op.id), Some(undone.id));
                prop_assert_eq!(active_ids(&log), before);
                prop_assert_eq!(log.stats().active, stats_before.active);
            } else {
                prop_assert!(before.is_empty());
            }
        }

        #[test]
        fn evicted_operations_never_return(
            capacity in 1usize..6,
            steps in prop::collection::vec(arb_step(), 0..60),
        ) {
            let (mut log, appended) = run(capacity, &steps)?;
            while log.redo().is_some() {}
            let held: Vec<OperationId> = log.snapshot().iter().map(|op| op.id).collect();
            for id in appended.iter().filter(|id| !held.contains(id)) {
                prop_assert_eq!(log.get(*id), None);
                prop_assert_eq!(log.undo(Some(*id)), None);
            }
        }
    }
}
