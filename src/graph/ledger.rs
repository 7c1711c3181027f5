use std::collections::HashSet;

use super::id::ObjectId;

/// What the ledger knows about an object when the engine reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Never seen in this pass; serialize it.
    Fresh,
    /// Already fully written; skip over it.
    Written,
    /// Reached again while its own serialization is still running (a cycle);
    /// skip over it as well.
    InProgress,
}

/// The set of shared objects one write pass has emitted.
///
/// Scoped to a single engine instance. Nothing is ever removed from the
/// written set; a new pass needs a new engine.
#[derive(Debug, Default)]
pub struct WriteLedger {
    written: HashSet<ObjectId>,
    active: HashSet<ObjectId>,
}

impl WriteLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `id`.
    pub fn visit(&self, id: ObjectId) -> Visit {
        if self.written.contains(&id) {
            Visit::Written
        } else if self.active.contains(&id) {
            Visit::InProgress
        } else {
            Visit::Fresh
        }
    }

    /// Marks `id` as being serialized.
    pub fn begin(&mut self, id: ObjectId) {
        self.active.insert(id);
    }

    /// Marks `id` as fully written.
    pub fn finish(&mut self, id: ObjectId) {
        self.active.remove(&id);
        self.written.insert(id);
    }

    /// Forgets an in-progress mark after a failed serialization.
    pub fn abandon(&mut self, id: ObjectId) {
        self.active.remove(&id);
    }

    /// True if `id` has been fully written.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.written.contains(&id)
    }

    /// Number of fully written objects.
    pub fn len(&self) -> usize {
        self.written.len()
    }

    /// True if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle() {
        let mut ledger = WriteLedger::new();
        let id = ObjectId::new(3);
        assert_eq!(ledger.visit(id), Visit::Fresh);
        ledger.begin(id);
        assert_eq!(ledger.visit(id), Visit::InProgress);
        ledger.finish(id);
        assert_eq!(ledger.visit(id), Visit::Written);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn abandoned_objects_are_fresh_again() {
        let mut ledger = WriteLedger::new();
        let id = ObjectId::new(0);
        ledger.begin(id);
        ledger.abandon(id);
        assert_eq!(ledger.visit(id), Visit::Fresh);
        assert!(ledger.is_empty());
    }
}
