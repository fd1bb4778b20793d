//! Versioned ordered tables.

use crate::types::{SequenceNumber, TableId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Handle to an open table.
///
/// Obtained from `open_table` on a transaction and valid for the life of the
/// environment that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Table {
    id: TableId,
}

impl Table {
    pub(crate) const fn new(id: TableId) -> Self {
        Self { id }
    }

    /// Catalog ID.
    #[must_use]
    pub const fn id(self) -> TableId {
        self.id
    }
}

#[derive(Debug, Clone)]
struct Version {
    sequence: SequenceNumber,
    value: Arc<[u8]>,
}

#[derive(Debug)]
struct CatalogEntry {
    id: TableId,
    created: SequenceNumber,
}

/// Committed contents of every table, with per-key version chains.
///
/// Each chain is ordered by sequence. A reader at snapshot `s` sees the
/// newest version at or below `s`; tables registered after `s` are invisible
/// to it.
#[derive(Debug, Default)]
pub(crate) struct TableStore {
    catalog: BTreeMap<Option<String>, CatalogEntry>,
    rows: HashMap<TableId, BTreeMap<Vec<u8>, Vec<Version>>>,
    next_id: u32,
}

impl TableStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Looks a table up by name as of `snapshot`.
    pub(crate) fn lookup(&self, name: Option<&str>, snapshot: SequenceNumber) -> Option<TableId> {
        self.catalog
            .get(&name.map(str::to_string))
            .filter(|entry| entry.created <= snapshot)
            .map(|entry| entry.id)
    }

    /// Whether table `id` exists as of `snapshot`.
    pub(crate) fn is_visible(&self, id: TableId, snapshot: SequenceNumber) -> bool {
        self.catalog
            .values()
            .any(|entry| entry.id == id && entry.created <= snapshot)
    }

    /// ID the next registered table will receive, `offset` registrations ahead.
    pub(crate) fn peek_next_id(&self, offset: usize) -> TableId {
        TableId::new(self.next_id + offset as u32)
    }

    /// Registers a table committed at `sequence`.
    pub(crate) fn register(&mut self, id: TableId, name: Option<String>, sequence: SequenceNumber) {
        self.next_id = self.next_id.max(id.as_u32() + 1);
        self.rows.entry(id).or_default();
        self.catalog.insert(
            name,
            CatalogEntry {
                id,
                created: sequence,
            },
        );
    }

    /// Value of `key` visible at `snapshot`.
    pub(crate) fn get_at(
        &self,
        table: TableId,
        key: &[u8],
        snapshot: SequenceNumber,
    ) -> Option<Arc<[u8]>> {
        self.rows
            .get(&table)?
            .get(key)?
            .iter()
            .rev()
            .find(|version| version.sequence <= snapshot)
            .map(|version| Arc::clone(&version.value))
    }

    /// Appends a version of `key` committed at `sequence`.
    pub(crate) fn insert(
        &mut self,
        table: TableId,
        key: Vec<u8>,
        value: Arc<[u8]>,
        sequence: SequenceNumber,
    ) {
        self.rows
            .entry(table)
            .or_default()
            .entry(key)
            .or_default()
            .push(Version { sequence, value });
    }

    /// Number of keys across all tables.
    pub(crate) fn entry_count(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    /// Number of registered tables.
    pub(crate) fn table_count(&self) -> usize {
        self.catalog.len()
    }
}
