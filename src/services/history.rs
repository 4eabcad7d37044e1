//! Operation log — the authoritative committed history with undo/redo.
//!
//! DESIGN
//! ======
//! History is a bounded ring (`VecDeque`) of operations in commit order.
//! Each entry carries a sequence number that never repeats, so the redo
//! stack can hold plain `u64` references: an entry's position is its
//! sequence minus the sequence of the current head, and a reference below
//! the head has been evicted.
//!
//! Undo and redo flip `undone` in place. Nothing is ever reordered, so the
//! visual order is always history order.
//!
//! RETENTION
//! =========
//! When an append pushes the ring past `capacity`, the oldest entries are
//! dropped. Any redo reference to a dropped entry is purged at the same time
//! and `redo` skips references that no longer resolve, so a redo can never
//! resurrect an operation the log no longer holds.
//!
//! All mutations are total: a missing or already-undone target is `None`,
//! never an error.

use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use canvas::doc::{Operation, OperationBody, OperationId, ParticipantId};
use serde::Serialize;
use uuid::Uuid;

/// Counters exposed through `/api/stats` and used to enable controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub total: usize,
    pub active: usize,
    pub undone: usize,
    pub can_undo: bool,
    pub can_redo: bool,
}

struct Entry {
    seq: u64,
    op: Operation,
}

/// The single source of truth every replica converges to.
pub struct OperationLog {
    history: VecDeque<Entry>,
    /// Operation id -> sequence number, for targeted undo.
    index: HashMap<OperationId, u64>,
    /// Sequence numbers of undone operations, most recent last.
    redo_stack: Vec<u64>,
    capacity: usize,
    next_seq: u64,
    last_created_at: i64,
}

impl OperationLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.min(4096)),
            index: HashMap::new(),
            redo_stack: Vec::new(),
            capacity: capacity.max(1),
            next_seq: 0,
            last_created_at: 0,
        }
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Commit a new operation. Clears the redo stack, then evicts from the
    /// head while the ring is over capacity.
    pub fn append(&mut self, author_id: ParticipantId, body: OperationBody) -> Operation {
        let created_at = now_ms().max(self.last_created_at);
        self.last_created_at = created_at;

        let op = Operation { id: Uuid::new_v4(), author_id, body, created_at, undone: false };
        let seq = self.next_seq;
        self.next_seq += 1;

        self.index.insert(op.id, seq);
        self.history.push_back(Entry { seq, op: op.clone() });
        self.redo_stack.clear();
        self.evict_overflow();

        op
    }

    /// Undo a specific operation, or the newest active one when `target` is
    /// `None`. Returns the operation in its new (undone) state.
    pub fn undo(&mut self, target: Option<OperationId>) -> Option<Operation> {
        let pos = match target {
            Some(id) => {
                let pos = self.position(*self.index.get(&id)?)?;
                if self.history[pos].op.undone {
                    return None;
                }
                pos
            }
            None => self.history.iter().rposition(|entry| !entry.op.undone)?,
        };

        let entry = &mut self.history[pos];
        entry.op.undone = true;
        self.redo_stack.push(entry.seq);
        Some(entry.op.clone())
    }

    /// Re-activate the most recently undone operation in place.
    pub fn redo(&mut self) -> Option<Operation> {
        while let Some(seq) = self.redo_stack.pop() {
            let Some(pos) = self.position(seq) else {
                continue;
            };
            let entry = &mut self.history[pos];
            if !entry.op.undone {
                continue;
            }
            entry.op.undone = false;
            return Some(entry.op.clone());
        }
        None
    }

    fn evict_overflow(&mut self) {
        let mut evicted = false;
        while self.history.len() > self.capacity {
            if let Some(entry) = self.history.pop_front() {
                self.index.remove(&entry.op.id);
                evicted = true;
            }
        }
        if evicted {
            let head = self.head_seq();
            self.redo_stack.retain(|seq| *seq >= head);
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Active operations in history order. Replaying these reconstructs the canvas.
    pub fn active(&self) -> impl Iterator<Item = &Operation> {
        self.history
            .iter()
            .map(|entry| &entry.op)
            .filter(|op| !op.undone)
    }

    /// Full history, active and undone, in order. Used for `init` snapshots.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Operation> {
        self.history.iter().map(|entry| entry.op.clone()).collect()
    }

    #[cfg(test)]
    #[must_use]
    pub fn get(&self, id: OperationId) -> Option<&Operation> {
        let pos = self.position(*self.index.get(&id)?)?;
        Some(&self.history[pos].op)
    }

    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn stats(&self) -> LogStats {
        let total = self.history.len();
        let active = self.active().count();
        LogStats {
            total,
            active,
            undone: total - active,
            can_undo: active > 0,
            can_redo: !self.redo_stack.is_empty(),
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn head_seq(&self) -> u64 {
        self.history.front().map_or(self.next_seq, |entry| entry.seq)
    }

    /// Resolve a sequence number to a ring position, `None` if evicted.
    fn position(&self, seq: u64) -> Option<usize> {
        let offset = seq.checked_sub(self.head_seq())?;
        let pos = usize::try_from(offset).ok()?;
        (pos < self.history.len()).then_some(pos)
    }
}

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
