//! Read-only transactions.

use crate::env::EnvShared;
use crate::error::{EngineError, EngineResult};
use crate::table::Table;
use crate::types::{SequenceNumber, TransactionId};
use crate::value::Value;
use std::sync::Arc;
use tracing::debug;

/// A read-only transaction over a consistent snapshot.
///
/// The snapshot is the last sequence committed when the reader began (or was
/// last renewed). Later commits are invisible to it, and it never blocks a
/// writer.
///
/// A reader can be [`reset`](Self::reset) to release its snapshot while
/// keeping its slot in the reader table, then [`renew`](Self::renew)ed to
/// observe the latest state without claiming a new slot.
pub struct RoTxn {
    shared: Arc<EnvShared>,
    slot: u64,
    id: TransactionId,
    snapshot: Option<SequenceNumber>,
}

impl RoTxn {
    pub(crate) fn begin(shared: Arc<EnvShared>) -> EngineResult<Self> {
        let snapshot = shared.committed();
        let slot = shared.readers.acquire(snapshot)?;
        let id = shared.allocate_txid();
        debug!(txid = %id, %snapshot, "read transaction started");
        Ok(Self {
            shared,
            slot,
            id,
            snapshot: Some(snapshot),
        })
    }

    /// Transaction ID of the current (or last) snapshot.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Snapshot sequence, or `None` while reset.
    #[must_use]
    pub fn snapshot(&self) -> Option<SequenceNumber> {
        self.snapshot
    }

    /// Whether the reader is reset.
    #[must_use]
    pub fn is_reset(&self) -> bool {
        self.snapshot.is_none()
    }

    /// Releases the snapshot; reads fail until [`renew`](Self::renew).
    pub fn reset(&mut self) {
        if self.snapshot.take().is_some() {
            self.shared.readers.set_snapshot(self.slot, None);
            debug!(txid = %self.id, "read transaction reset");
        }
    }

    /// Takes a fresh snapshot of the latest committed state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidOperation`] unless the reader is reset.
    pub fn renew(&mut self) -> EngineResult<()> {
        if self.snapshot.is_some() {
            return Err(EngineError::invalid_operation(
                "renew requires a reset reader",
            ));
        }
        let snapshot = self.shared.committed();
        self.shared.readers.set_snapshot(self.slot, Some(snapshot));
        self.id = self.shared.allocate_txid();
        self.snapshot = Some(snapshot);
        debug!(txid = %self.id, %snapshot, "read transaction renewed");
        Ok(())
    }

    /// Opens an existing table.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TableNotFound`] if the table did not exist at
    /// the snapshot, or [`EngineError::InvalidOperation`] while reset.
    pub fn open_table(&self, name: Option<&str>) -> EngineResult<Table> {
        let snapshot = self.pinned()?;
        self.shared
            .tables
            .read()
            .lookup(name, snapshot)
            .map(Table::new)
            .ok_or_else(|| EngineError::table_not_found(name))
    }

    /// Looks `key` up in `table`; `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidOperation`] while reset or for a table unknown
    ///   to the snapshot
    /// - [`EngineError::BadValSize`] for an empty or oversized key
    pub fn get(&self, table: Table, key: &[u8]) -> EngineResult<Option<Value<'_>>> {
        let snapshot = self.pinned()?;
        self.shared.check_key(key)?;
        let tables = self.shared.tables.read();
        if !tables.is_visible(table.id(), snapshot) {
            return Err(EngineError::invalid_operation(format!(
                "{} is not visible to this transaction",
                table.id()
            )));
        }
        Ok(tables.get_at(table.id(), key, snapshot).map(Value::new))
    }

    fn pinned(&self) -> EngineResult<SequenceNumber> {
        self.snapshot
            .ok_or_else(|| EngineError::invalid_operation("read transaction is reset"))
    }
}

impl Drop for RoTxn {
    fn drop(&mut self) {
        self.shared.readers.release(self.slot);
    }
}

impl std::fmt::Debug for RoTxn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoTxn")
            .field("id", &self.id)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}
