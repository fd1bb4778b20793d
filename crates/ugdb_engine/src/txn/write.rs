//! The write transaction.

use crate::env::EnvShared;
use crate::error::{EngineError, EngineResult};
use crate::log::LogRecord;
use crate::table::Table;
use crate::types::{SequenceNumber, TableId, TransactionId};
use crate::value::Value;
use parking_lot::{ArcMutexGuard, RawMutex};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Flags for [`RwTxn::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PutFlags(u8);

impl PutFlags {
    /// Overwrite any existing value.
    pub const NONE: Self = Self(0);
    /// Fail with [`EngineError::KeyExists`] if the key already has a value.
    pub const NO_OVERWRITE: Self = Self(0x01);

    /// Whether `NO_OVERWRITE` is set.
    #[must_use]
    pub const fn is_no_overwrite(self) -> bool {
        self.0 & 0x01 != 0
    }
}

/// The single write transaction of an environment.
///
/// Holds the writer lock from begin until commit, abort or drop. Writes are
/// buffered and become visible to new readers (and durable) only when
/// [`commit`](Self::commit) returns. Dropping an uncommitted transaction
/// discards its writes.
pub struct RwTxn {
    shared: Arc<EnvShared>,
    _writer: ArcMutexGuard<RawMutex, ()>,
    id: TransactionId,
    snapshot: SequenceNumber,
    new_tables: Vec<(TableId, Option<String>)>,
    pending: BTreeMap<(TableId, Vec<u8>), Arc<[u8]>>,
    finished: bool,
}

impl RwTxn {
    pub(crate) fn begin(shared: Arc<EnvShared>, writer: ArcMutexGuard<RawMutex, ()>) -> Self {
        let snapshot = shared.committed();
        let id = shared.allocate_txid();
        debug!(txid = %id, %snapshot, "write transaction started");
        Self {
            shared,
            _writer: writer,
            id,
            snapshot,
            new_tables: Vec::new(),
            pending: BTreeMap::new(),
            finished: false,
        }
    }

    /// Transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Sequence the transaction started from.
    #[must_use]
    pub fn snapshot(&self) -> SequenceNumber {
        self.snapshot
    }

    /// Opens a table, creating it when `create` is set and it is missing.
    ///
    /// A created table becomes durable with the transaction's commit.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TableNotFound`] if missing and `create` is false
    /// - [`EngineError::InvalidOperation`] if the name exceeds 65535 bytes
    pub fn open_table(&mut self, name: Option<&str>, create: bool) -> EngineResult<Table> {
        if let Some(id) = self.shared.tables.read().lookup(name, self.snapshot) {
            return Ok(Table::new(id));
        }
        if let Some((id, _)) = self
            .new_tables
            .iter()
            .find(|(_, pending)| pending.as_deref() == name)
        {
            return Ok(Table::new(*id));
        }
        if !create {
            return Err(EngineError::table_not_found(name));
        }
        if name.is_some_and(|n| n.len() > usize::from(u16::MAX)) {
            return Err(EngineError::invalid_operation("table name too long"));
        }

        let id = self.shared.tables.read().peek_next_id(self.new_tables.len());
        self.new_tables.push((id, name.map(str::to_string)));
        debug!(txid = %self.id, table = %id, "table created");
        Ok(Table::new(id))
    }

    /// Looks `key` up, seeing this transaction's own puts first.
    ///
    /// # Errors
    ///
    /// - [`EngineError::BadValSize`] for an empty or oversized key
    /// - [`EngineError::InvalidOperation`] for a table unknown to the transaction
    pub fn get(&self, table: Table, key: &[u8]) -> EngineResult<Option<Value<'_>>> {
        self.shared.check_key(key)?;
        self.check_table(table)?;
        if let Some(value) = self.pending.get(&(table.id(), key.to_vec())) {
            return Ok(Some(Value::new(Arc::clone(value))));
        }
        Ok(self
            .shared
            .tables
            .read()
            .get_at(table.id(), key, self.snapshot)
            .map(Value::new))
    }

    /// Buffers `key → value` in `table`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::KeyExists`] with `NO_OVERWRITE` when the key has a value
    /// - [`EngineError::BadValSize`] for an empty or oversized key
    /// - [`EngineError::InvalidOperation`] for a table unknown to the transaction
    pub fn put(
        &mut self,
        table: Table,
        key: &[u8],
        value: &[u8],
        flags: PutFlags,
    ) -> EngineResult<()> {
        self.shared.check_key(key)?;
        self.check_table(table)?;
        if flags.is_no_overwrite() && self.get(table, key)?.is_some() {
            return Err(EngineError::KeyExists);
        }
        self.pending
            .insert((table.id(), key.to_vec()), Arc::from(value));
        Ok(())
    }

    /// Writes the transaction to the log and publishes it.
    ///
    /// Returns the commit's sequence number. A transaction with no changes
    /// writes nothing and returns its starting snapshot.
    ///
    /// # Errors
    ///
    /// Returns the log error if the append or sync fails; the log is cut back
    /// and nothing is published. If the cut itself fails, later writers get
    /// [`EngineError::Poisoned`].
    pub fn commit(mut self) -> EngineResult<SequenceNumber> {
        self.finished = true;
        if self.pending.is_empty() && self.new_tables.is_empty() {
            debug!(txid = %self.id, "empty write transaction committed");
            return Ok(self.snapshot);
        }

        let txid = self.id;
        let sequence = self.snapshot.next();
        let new_tables = std::mem::take(&mut self.new_tables);
        let pending = std::mem::take(&mut self.pending);
        let puts = pending.len();

        let mut records = Vec::with_capacity(new_tables.len() + pending.len() + 2);
        records.push(LogRecord::Begin { txid });
        for (table, name) in &new_tables {
            records.push(LogRecord::CreateTable {
                txid,
                table: *table,
                name: name.clone(),
            });
        }
        for ((table, key), value) in &pending {
            records.push(LogRecord::Put {
                txid,
                table: *table,
                key: key.clone(),
                value: value.to_vec(),
            });
        }
        records.push(LogRecord::Commit { txid, sequence });

        {
            let mut log = self.shared.log.lock();
            let offset = log.append_group(&records)?;
            if let Err(err) = log.persist(self.shared.config.sync_on_commit) {
                log.rollback(offset);
                return Err(err);
            }
        }

        {
            let mut tables = self.shared.tables.write();
            for (table, name) in new_tables {
                tables.register(table, name, sequence);
            }
            for ((table, key), value) in pending {
                tables.insert(table, key, value, sequence);
            }
        }
        self.shared
            .committed_seq
            .store(sequence.as_u64(), Ordering::SeqCst);

        debug!(txid = %txid, %sequence, puts, "write transaction committed");
        Ok(sequence)
    }

    /// Discards the transaction's writes.
    pub fn abort(mut self) {
        self.finished = true;
        debug!(txid = %self.id, discarded = self.pending.len(), "write transaction aborted");
    }

    fn check_table(&self, table: Table) -> EngineResult<()> {
        let known = self.shared.tables.read().is_visible(table.id(), self.snapshot)
            || self.new_tables.iter().any(|(id, _)| *id == table.id());
        if known {
            Ok(())
        } else {
            Err(EngineError::invalid_operation(format!(
                "{} is not visible to this transaction",
                table.id()
            )))
        }
    }
}

impl Drop for RwTxn {
    fn drop(&mut self) {
        if !self.finished {
            debug!(txid = %self.id, discarded = self.pending.len(), "write transaction dropped");
        }
    }
}

impl std::fmt::Debug for RwTxn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwTxn")
            .field("id", &self.id)
            .field("snapshot", &self.snapshot)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
