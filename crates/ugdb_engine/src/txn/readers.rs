//! Reader slot table.

use crate::error::{EngineError, EngineResult};
use crate::types::SequenceNumber;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Bounded table of live read transactions and their snapshots.
///
/// A slot is claimed when a reader begins and released when it is dropped.
/// A reset reader keeps its slot with no snapshot, so renewing it never
/// fails for lack of room.
#[derive(Debug)]
pub(crate) struct ReaderTable {
    max: usize,
    inner: Mutex<Slots>,
}

#[derive(Debug, Default)]
struct Slots {
    next: u64,
    snapshots: HashMap<u64, Option<SequenceNumber>>,
}

impl ReaderTable {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            max,
            inner: Mutex::new(Slots::default()),
        }
    }

    /// Claims a slot pinned at `snapshot`.
    pub(crate) fn acquire(&self, snapshot: SequenceNumber) -> EngineResult<u64> {
        let mut slots = self.inner.lock();
        if slots.snapshots.len() >= self.max {
            return Err(EngineError::ReadersFull { max: self.max });
        }
        let slot = slots.next;
        slots.next += 1;
        slots.snapshots.insert(slot, Some(snapshot));
        Ok(slot)
    }

    /// Re-pins (or, with `None`, unpins) a claimed slot.
    pub(crate) fn set_snapshot(&self, slot: u64, snapshot: Option<SequenceNumber>) {
        if let Some(entry) = self.inner.lock().snapshots.get_mut(&slot) {
            *entry = snapshot;
        }
    }

    pub(crate) fn release(&self, slot: u64) {
        self.inner.lock().snapshots.remove(&slot);
    }

    /// Readers holding a snapshot.
    pub(crate) fn active(&self) -> usize {
        self.inner
            .lock()
            .snapshots
            .values()
            .filter(|s| s.is_some())
            .count()
    }

    /// Claimed slots, pinned or not.
    pub(crate) fn claimed(&self) -> usize {
        self.inner.lock().snapshots.len()
    }

    /// Oldest snapshot still pinned.
    pub(crate) fn oldest(&self) -> Option<SequenceNumber> {
        self.inner.lock().snapshots.values().flatten().min().copied()
    }
}
