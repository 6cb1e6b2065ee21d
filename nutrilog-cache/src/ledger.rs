//! Per-key bookkeeping for overlapping optimistic mutations.
//!
//! Every mutation carries a sequence number issued by the cache. The ledger
//! for a key remembers the newest mutation that actually wrote it
//! speculatively and how many mutations are still unsettled. A writer that is
//! no longer the newest must not restore its snapshot (that would erase a
//! newer speculative write), so it marks the key dirty instead. A dirty key is
//! invalidated as soon as nothing is left pending on it, which forces a
//! refetch of server truth. Mutations that wrote nothing never own the key.

use crate::entry::CacheEntry;

/// Lifecycle of one optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationState {
    /// Speculative write applied, server call outstanding.
    Pending,
    /// Server accepted the write; the key was (or will be) invalidated.
    Committed,
    /// Server rejected the write; the snapshot was restored.
    RolledBack,
    /// Server rejected the write, but a newer mutation owns the key, so the
    /// snapshot was dropped and the key was left to be reconciled by refetch.
    Superseded,
}

impl MutationState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Handle for one started mutation, returned by
/// [`KeyedCache::begin_mutation`](crate::KeyedCache::begin_mutation) and
/// consumed when it settles.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationTicket {
    pub(crate) id: u64,
    pub(crate) snapshot: Option<CacheEntry>,
    pub(crate) applied: bool,
}

impl MutationTicket {
    /// Cache-wide sequence number of the mutation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The entry as it was before the speculative write.
    pub fn snapshot(&self) -> Option<&CacheEntry> {
        self.snapshot.as_ref()
    }

    /// Whether a speculative value was written.
    pub fn applied(&self) -> bool {
        self.applied
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MutationLedger {
    latest: u64,
    pending: usize,
    dirty: bool,
}

/// What the cache must do to settle one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Settlement {
    pub state: MutationState,
    /// Restore the mutation's snapshot.
    pub restore: bool,
    /// Mark the mutated key (and everything under its scope) stale.
    pub invalidate: bool,
    /// No mutation remains pending on the key; the ledger can be dropped.
    pub drained: bool,
}

impl MutationLedger {
    pub(crate) fn begin(&mut self, mutation_id: u64, applied: bool) {
        if applied {
            self.latest = self.latest.max(mutation_id);
        }
        self.pending += 1;
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending
    }

    fn owns_key(&self, mutation_id: u64, applied: bool) -> bool {
        applied && mutation_id == self.latest
    }

    pub(crate) fn commit(&mut self, mutation_id: u64, applied: bool) -> Settlement {
        self.pending = self.pending.saturating_sub(1);
        let owns_key = self.owns_key(mutation_id, applied);
        if !owns_key {
            self.dirty = true;
        }
        let drained = self.pending == 0;
        Settlement {
            state: MutationState::Committed,
            restore: false,
            invalidate: owns_key || (drained && self.dirty),
            drained,
        }
    }

    pub(crate) fn roll_back(&mut self, mutation_id: u64, applied: bool) -> Settlement {
        self.pending = self.pending.saturating_sub(1);
        let drained = self.pending == 0;
        if !applied {
            return Settlement {
                state: MutationState::RolledBack,
                restore: false,
                invalidate: drained && self.dirty,
                drained,
            };
        }

        let owns_key = self.owns_key(mutation_id, applied);
        let state = if owns_key {
            MutationState::RolledBack
        } else {
            self.dirty = true;
            MutationState::Superseded
        };
        Settlement {
            state,
            restore: owns_key,
            // A restored snapshot was taken on top of an older speculative
            // write when the ledger is dirty, so it cannot be served as truth.
            invalidate: self.dirty && (owns_key || drained),
            drained,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lone_mutation_rolls_back_cleanly() {
        let mut ledger = MutationLedger::default();
        ledger.begin(1, true);
        let settlement = ledger.roll_back(1, true);
        assert_eq!(settlement.state, MutationState::RolledBack);
        assert!(settlement.restore);
        assert!(!settlement.invalidate);
        assert!(settlement.drained);
    }

    #[test]
    fn test_lone_mutation_commit_invalidates() {
        let mut ledger = MutationLedger::default();
        ledger.begin(1, true);
        let settlement = ledger.commit(1, true);
        assert_eq!(settlement.state, MutationState::Committed);
        assert!(settlement.invalidate);
        assert!(!settlement.restore);
    }

    #[test]
    fn test_superseded_failure_does_not_restore() {
        let mut ledger = MutationLedger::default();
        ledger.begin(1, true);
        ledger.begin(2, true);

        let first = ledger.roll_back(1, true);
        assert_eq!(first.state, MutationState::Superseded);
        assert!(!first.restore);
        assert!(!first.invalidate);
        assert!(!first.drained);

        // The newer mutation's snapshot contains the failed write, so
        // restoring it must also invalidate.
        let second = ledger.roll_back(2, true);
        assert_eq!(second.state, MutationState::RolledBack);
        assert!(second.restore);
        assert!(second.invalidate);
        assert!(second.drained);
    }

    #[test]
    fn test_superseded_commit_defers_invalidation_to_owner() {
        let mut ledger = MutationLedger::default();
        ledger.begin(1, true);
        ledger.begin(2, true);

        let first = ledger.commit(1, true);
        assert!(!first.invalidate);

        let second = ledger.commit(2, true);
        assert!(second.invalidate);
        assert!(second.drained);
    }

    #[test]
    fn test_older_mutation_settling_last_still_reconciles() {
        let mut ledger = MutationLedger::default();
        ledger.begin(1, true);
        ledger.begin(2, true);

        let newer = ledger.commit(2, true);
        assert!(newer.invalidate);
        assert!(!newer.drained);

        let older = ledger.roll_back(1, true);
        assert_eq!(older.state, MutationState::Superseded);
        assert!(older.invalidate);
        assert!(older.drained);
    }

    #[test]
    fn test_mutation_that_wrote_nothing_never_owns_the_key() {
        let mut ledger = MutationLedger::default();
        ledger.begin(1, true);
        ledger.begin(2, false);

        let writer = ledger.roll_back(1, true);
        assert_eq!(writer.state, MutationState::RolledBack);
        assert!(writer.restore);
        assert!(!writer.invalidate);
        assert!(!writer.drained);

        let silent = ledger.roll_back(2, false);
        assert_eq!(silent.state, MutationState::RolledBack);
        assert!(!silent.restore);
        assert!(!silent.invalidate);
        assert!(silent.drained);
    }

    #[test]
    fn test_lone_commit_without_write_still_invalidates() {
        let mut ledger = MutationLedger::default();
        ledger.begin(4, false);
        let settlement = ledger.commit(4, false);
        assert!(settlement.invalidate);
        assert!(settlement.drained);
    }

    #[test]
    fn test_settled_states() {
        assert!(!MutationState::Pending.is_settled());
        assert!(MutationState::Committed.is_settled());
        assert!(MutationState::RolledBack.is_settled());
        assert!(MutationState::Superseded.is_settled());
    }
}
