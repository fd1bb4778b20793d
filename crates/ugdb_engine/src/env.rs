//! The environment handle and recovery.

use crate::config::Config;
use crate::dir::EnvDir;
use crate::error::{EngineError, EngineResult};
use crate::log::{LogRecord, LogWriter};
use crate::table::TableStore;
use crate::txn::{ReaderTable, RoTxn, RwTxn};
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use ugdb_storage::{FileBackend, InMemoryBackend, StorageBackend};

/// State shared by an environment and its transactions.
pub(crate) struct EnvShared {
    pub(crate) config: Config,
    dir: Option<EnvDir>,
    pub(crate) log: Mutex<LogWriter>,
    pub(crate) tables: RwLock<TableStore>,
    pub(crate) committed_seq: AtomicU64,
    next_txid: AtomicU64,
    writer: Arc<Mutex<()>>,
    pub(crate) readers: ReaderTable,
}

impl EnvShared {
    pub(crate) fn committed(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    pub(crate) fn allocate_txid(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    pub(crate) fn check_key(&self, key: &[u8]) -> EngineResult<()> {
        let max = self.config.max_key_size;
        if key.is_empty() || key.len() > max {
            return Err(EngineError::BadValSize {
                len: key.len(),
                max,
            });
        }
        Ok(())
    }
}

/// Point-in-time statistics of an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvStat {
    /// Keys across all tables.
    pub entries: usize,
    /// Registered tables.
    pub tables: usize,
    /// Last committed sequence.
    pub committed_seq: SequenceNumber,
    /// Readers currently holding a snapshot.
    pub active_readers: usize,
    /// Reader slots claimed, including reset readers.
    pub reader_slots: usize,
    /// Oldest snapshot still pinned by a reader.
    pub oldest_reader: Option<SequenceNumber>,
    /// Commit log size in bytes.
    pub log_size: u64,
}

/// An open environment: a commit log plus the tables rebuilt from it.
///
/// Cloning yields another handle to the same environment. The directory lock
/// is held until the last handle and every transaction are dropped.
#[derive(Clone)]
pub struct Environment {
    shared: Arc<EnvShared>,
}

impl Environment {
    /// Opens the environment in the existing directory `path`.
    ///
    /// Takes the directory lock, creates the commit log if missing and
    /// replays it.
    ///
    /// # Errors
    ///
    /// - `Io` with `NotFound` if `path` does not exist
    /// - [`EngineError::NotADirectory`] if it is not a directory
    /// - [`EngineError::EnvironmentLocked`] if another handle holds the lock
    /// - [`EngineError::LogCorruption`] or [`EngineError::ChecksumMismatch`]
    ///   if the log cannot be replayed
    pub fn open(path: &Path, config: Config) -> EngineResult<Self> {
        let dir = EnvDir::open(path)?;
        let log_path = dir.log_path();
        let fresh = !log_path.exists();
        let backend = FileBackend::open(&log_path)?;
        if fresh {
            dir.sync()?;
        }
        info!(path = %path.display(), "opening environment");
        Self::build(Box::new(backend), Some(dir), config)
    }

    /// Opens an environment that lives only in memory.
    ///
    /// # Errors
    ///
    /// Infallible in practice; the signature matches [`Environment::open`].
    pub fn open_in_memory(config: Config) -> EngineResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), config)
    }

    /// Opens an environment over an arbitrary byte store, replaying whatever
    /// log it already holds.
    ///
    /// # Errors
    ///
    /// Returns the recovery error if the log cannot be replayed.
    pub fn open_with_backend(
        backend: Box<dyn StorageBackend>,
        config: Config,
    ) -> EngineResult<Self> {
        Self::build(backend, None, config)
    }

    fn build(
        backend: Box<dyn StorageBackend>,
        dir: Option<EnvDir>,
        config: Config,
    ) -> EngineResult<Self> {
        let mut log = LogWriter::new(backend);
        let recovered = recover(&mut log)?;
        let readers = ReaderTable::new(config.max_readers);

        Ok(Self {
            shared: Arc::new(EnvShared {
                config,
                dir,
                log: Mutex::new(log),
                tables: RwLock::new(recovered.tables),
                committed_seq: AtomicU64::new(recovered.committed.as_u64()),
                next_txid: AtomicU64::new(recovered.next_txid),
                writer: Arc::new(Mutex::new(())),
                readers,
            }),
        })
    }

    /// Begins a read-only transaction on the latest committed state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ReadersFull`] if every reader slot is taken.
    pub fn begin_ro(&self) -> EngineResult<RoTxn> {
        RoTxn::begin(Arc::clone(&self.shared))
    }

    /// Begins the write transaction, blocking while another one is live.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Poisoned`] if an earlier commit could not be
    /// rolled back.
    pub fn begin_rw(&self) -> EngineResult<RwTxn> {
        let guard = self.shared.writer.lock_arc();
        self.check_poisoned()?;
        Ok(RwTxn::begin(Arc::clone(&self.shared), guard))
    }

    /// Begins the write transaction unless another one is live.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Poisoned`] if an earlier commit could not be
    /// rolled back.
    pub fn try_begin_rw(&self) -> EngineResult<Option<RwTxn>> {
        let Some(guard) = self.shared.writer.try_lock_arc() else {
            return Ok(None);
        };
        self.check_poisoned()?;
        Ok(Some(RwTxn::begin(Arc::clone(&self.shared), guard)))
    }

    fn check_poisoned(&self) -> EngineResult<()> {
        if self.shared.log.lock().is_poisoned() {
            return Err(EngineError::Poisoned);
        }
        Ok(())
    }

    /// Last committed sequence.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.shared.committed()
    }

    /// Directory of a file-backed environment.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.shared.dir.as_ref().map(EnvDir::path)
    }

    /// Environment configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Collects current statistics.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the log size is unavailable.
    pub fn stat(&self) -> EngineResult<EnvStat> {
        let log_size = self.shared.log.lock().size()?;
        let tables = self.shared.tables.read();
        Ok(EnvStat {
            entries: tables.entry_count(),
            tables: tables.table_count(),
            committed_seq: self.shared.committed(),
            active_readers: self.shared.readers.active(),
            reader_slots: self.shared.readers.claimed(),
            oldest_reader: self.shared.readers.oldest(),
            log_size,
        })
    }

    /// Flushes and syncs the log, then releases this handle.
    ///
    /// The directory lock goes away once every other handle is gone too.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidOperation`] while any reader (reset or not)
    ///   or the writer is alive; the handle is still released
    /// - the storage error from the final sync
    pub fn close(self) -> EngineResult<()> {
        let readers = self.shared.readers.claimed();
        if readers > 0 || self.shared.writer.is_locked() {
            return Err(EngineError::invalid_operation(format!(
                "close with live transactions ({readers} readers)"
            )));
        }
        self.shared.log.lock().persist(true)?;
        if Arc::strong_count(&self.shared) == 1 {
            info!(committed = %self.shared.committed(), "environment closed");
        } else {
            debug!("environment handle closed; other handles remain");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("path", &self.path())
            .field("committed_seq", &self.committed_seq())
            .finish_non_exhaustive()
    }
}

struct Recovered {
    tables: TableStore,
    committed: SequenceNumber,
    next_txid: u64,
}

/// Replays the committed groups of `log` and cuts off anything after the
/// last one.
fn recover(log: &mut LogWriter) -> EngineResult<Recovered> {
    let mut tables = TableStore::new();
    let mut groups: HashMap<TransactionId, Vec<LogRecord>> = HashMap::new();
    let mut committed = SequenceNumber::default();
    let mut max_txid = 0u64;
    let mut applied = 0usize;
    let mut commit_end = 0u64;

    let (size, torn) = {
        let mut reader = log.reader()?;
        loop {
            let Some(item) = reader.next() else { break };
            let (offset, record) = item?;
            let txid = record.txid();
            max_txid = max_txid.max(txid.as_u64());

            match record {
                LogRecord::Begin { .. } => {
                    if groups.insert(txid, Vec::new()).is_some() {
                        return Err(EngineError::log_corruption(
                            offset,
                            format!("{txid} began twice"),
                        ));
                    }
                }
                LogRecord::CreateTable { .. } | LogRecord::Put { .. } => {
                    let Some(group) = groups.get_mut(&txid) else {
                        return Err(EngineError::log_corruption(
                            offset,
                            format!("record for {txid} outside its group"),
                        ));
                    };
                    group.push(record);
                }
                LogRecord::Commit { sequence, .. } => {
                    let Some(group) = groups.remove(&txid) else {
                        return Err(EngineError::log_corruption(
                            offset,
                            format!("commit for {txid} without begin"),
                        ));
                    };
                    if sequence <= committed {
                        return Err(EngineError::log_corruption(
                            offset,
                            format!("{sequence} does not follow {committed}"),
                        ));
                    }
                    apply(&mut tables, group, sequence);
                    committed = sequence;
                    applied += 1;
                    commit_end = reader.valid_end();
                }
            }
        }
        (log.size()?, reader.is_torn())
    };

    if commit_end < size {
        warn!(
            valid = commit_end,
            size,
            torn,
            uncommitted = groups.len(),
            "discarding commit log tail"
        );
        log.truncate(commit_end)?;
    }

    info!(
        transactions = applied,
        %committed,
        tables = tables.table_count(),
        entries = tables.entry_count(),
        "recovery complete"
    );

    Ok(Recovered {
        tables,
        committed,
        next_txid: max_txid + 1,
    })
}

fn apply(tables: &mut TableStore, group: Vec<LogRecord>, sequence: SequenceNumber) {
    for record in group {
        match record {
            LogRecord::CreateTable { table, name, .. } => tables.register(table, name, sequence),
            LogRecord::Put {
                table, key, value, ..
            } => tables.insert(table, key, value.into(), sequence),
            LogRecord::Begin { .. } | LogRecord::Commit { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::PutFlags;
    use std::sync::atomic::AtomicBool;
    use tempfile::tempdir;
    use ugdb_storage::{StorageError, StorageResult};

    fn memory_env() -> Environment {
        Environment::open_in_memory(Config::default()).unwrap()
    }

    #[test]
    fn commit_then_read() {
        let env = memory_env();
        let mut txn = env.begin_rw().unwrap();
        let main = txn.open_table(None, true).unwrap();
        txn.put(main, b"k", b"v", PutFlags::NONE).unwrap();
        let seq = txn.commit().unwrap();
        assert_eq!(seq, SequenceNumber::new(1));

        let ro = env.begin_ro().unwrap();
        let main = ro.open_table(None).unwrap();
        assert_eq!(ro.get(main, b"k").unwrap().unwrap(), *b"v");
        assert!(ro.get(main, b"missing").unwrap().is_none());
    }

    #[test]
    fn reader_keeps_its_snapshot() {
        let env = memory_env();
        let mut txn = env.begin_rw().unwrap();
        let main = txn.open_table(None, true).unwrap();
        txn.put(main, b"k", b"old", PutFlags::NONE).unwrap();
        txn.commit().unwrap();

        let ro = env.begin_ro().unwrap();

        let mut txn = env.begin_rw().unwrap();
        txn.put(main, b"k", b"new", PutFlags::NONE).unwrap();
        txn.commit().unwrap();

        assert_eq!(ro.get(main, b"k").unwrap().unwrap(), *b"old");
        let fresh = env.begin_ro().unwrap();
        assert_eq!(fresh.get(main, b"k").unwrap().unwrap(), *b"new");
    }

    #[test]
    fn reset_and_renew() {
        let env = memory_env();
        let mut txn = env.begin_rw().unwrap();
        let main = txn.open_table(None, true).unwrap();
        txn.commit().unwrap();

        let mut ro = env.begin_ro().unwrap();
        assert!(ro.renew().is_err());
        ro.reset();
        assert!(ro.is_reset());
        assert!(ro.get(main, b"k").is_err());
        let stat = env.stat().unwrap();
        assert_eq!(stat.active_readers, 0);
        assert_eq!(stat.reader_slots, 1);
        assert_eq!(stat.oldest_reader, None);

        let mut txn = env.begin_rw().unwrap();
        txn.put(main, b"k", b"v", PutFlags::NONE).unwrap();
        txn.commit().unwrap();

        ro.renew().unwrap();
        assert_eq!(ro.get(main, b"k").unwrap().unwrap(), *b"v");
    }

    #[test]
    fn no_overwrite_and_key_size() {
        let env = Environment::open_in_memory(Config::new().max_key_size(4)).unwrap();
        let mut txn = env.begin_rw().unwrap();
        let main = txn.open_table(None, true).unwrap();
        txn.put(main, b"k", b"1", PutFlags::NO_OVERWRITE).unwrap();
        assert!(matches!(
            txn.put(main, b"k", b"2", PutFlags::NO_OVERWRITE),
            Err(EngineError::KeyExists)
        ));
        assert!(matches!(
            txn.put(main, b"", b"x", PutFlags::NONE),
            Err(EngineError::BadValSize { len: 0, max: 4 })
        ));
        assert!(matches!(
            txn.get(main, b"12345"),
            Err(EngineError::BadValSize { len: 5, max: 4 })
        ));
        assert_eq!(txn.get(main, b"k").unwrap().unwrap(), *b"1");
    }

    #[test]
    fn missing_table_without_create() {
        let env = memory_env();
        let mut txn = env.begin_rw().unwrap();
        assert!(matches!(
            txn.open_table(None, false),
            Err(EngineError::TableNotFound { .. })
        ));
        txn.abort();

        let ro = env.begin_ro().unwrap();
        assert!(matches!(
            ro.open_table(Some("side")),
            Err(EngineError::TableNotFound { .. })
        ));
    }

    #[test]
    fn close_refuses_live_transactions() {
        let env = memory_env();
        let ro = env.begin_ro().unwrap();
        assert!(matches!(
            env.clone().close(),
            Err(EngineError::InvalidOperation { .. })
        ));
        drop(ro);

        let rw = env.begin_rw().unwrap();
        assert!(env.clone().close().is_err());
        rw.abort();
        env.close().unwrap();
    }

    #[test]
    fn single_writer() {
        let env = memory_env();
        let txn = env.begin_rw().unwrap();
        assert!(env.try_begin_rw().unwrap().is_none());
        drop(txn);
        assert!(env.try_begin_rw().unwrap().is_some());
    }

    #[test]
    fn reader_limit() {
        let env = Environment::open_in_memory(Config::new().max_readers(1)).unwrap();
        let _ro = env.begin_ro().unwrap();
        assert!(matches!(
            env.begin_ro(),
            Err(EngineError::ReadersFull { max: 1 })
        ));
    }

    #[test]
    fn aborted_writes_vanish() {
        let env = memory_env();
        let mut txn = env.begin_rw().unwrap();
        let main = txn.open_table(None, true).unwrap();
        txn.commit().unwrap();

        let mut txn = env.begin_rw().unwrap();
        txn.put(main, b"k", b"v", PutFlags::NONE).unwrap();
        txn.abort();

        let ro = env.begin_ro().unwrap();
        assert!(ro.get(main, b"k").unwrap().is_none());
        assert_eq!(env.committed_seq(), SequenceNumber::new(1));
    }

    #[test]
    fn reopen_replays_log() {
        let dir = tempdir().unwrap();
        {
            let env = Environment::open(dir.path(), Config::default()).unwrap();
            let mut txn = env.begin_rw().unwrap();
            let main = txn.open_table(None, true).unwrap();
            txn.put(main, b"a", b"1", PutFlags::NONE).unwrap();
            txn.commit().unwrap();
            let mut txn = env.begin_rw().unwrap();
            txn.put(main, b"a", b"2", PutFlags::NONE).unwrap();
            txn.commit().unwrap();
            env.close().unwrap();
        }

        let env = Environment::open(dir.path(), Config::default()).unwrap();
        assert_eq!(env.committed_seq(), SequenceNumber::new(2));
        let ro = env.begin_ro().unwrap();
        let main = ro.open_table(None).unwrap();
        assert_eq!(ro.get(main, b"a").unwrap().unwrap(), *b"2");

        let stat = env.stat().unwrap();
        assert_eq!(stat.entries, 1);
        assert_eq!(stat.tables, 1);
        assert_eq!(stat.active_readers, 1);
        assert!(stat.log_size > 0);
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _env = Environment::open(dir.path(), Config::default()).unwrap();
        assert!(matches!(
            Environment::open(dir.path(), Config::default()),
            Err(EngineError::EnvironmentLocked)
        ));
    }

    #[test]
    fn torn_tail_is_truncated() {
        let backend = InMemoryBackend::new();
        {
            let env =
                Environment::open_with_backend(Box::new(backend.clone()), Config::default())
                    .unwrap();
            let mut txn = env.begin_rw().unwrap();
            let main = txn.open_table(None, true).unwrap();
            txn.put(main, b"k", b"v", PutFlags::NONE).unwrap();
            txn.commit().unwrap();
        }
        let committed_len = backend.snapshot().len();
        backend.corrupt_with(|bytes| bytes.extend_from_slice(b"UGLG\x01"));

        let env =
            Environment::open_with_backend(Box::new(backend.clone()), Config::default()).unwrap();
        assert_eq!(backend.snapshot().len(), committed_len);
        let ro = env.begin_ro().unwrap();
        let main = ro.open_table(None).unwrap();
        assert_eq!(ro.get(main, b"k").unwrap().unwrap(), *b"v");
    }

    #[test]
    fn uncommitted_group_is_ignored() {
        let backend = InMemoryBackend::new();
        {
            let mut log = LogWriter::new(Box::new(backend.clone()));
            let txid = TransactionId::new(7);
            log.append_group(&[
                LogRecord::Begin { txid },
                LogRecord::CreateTable {
                    txid,
                    table: crate::types::TableId::MAIN,
                    name: None,
                },
            ])
            .unwrap();
        }

        let env =
            Environment::open_with_backend(Box::new(backend.clone()), Config::default()).unwrap();
        assert_eq!(env.committed_seq(), SequenceNumber::default());
        assert!(backend.snapshot().is_empty());
        let ro = env.begin_ro().unwrap();
        assert!(ro.open_table(None).is_err());

        let txn = env.begin_rw().unwrap();
        assert!(txn.id().as_u64() > 7);
    }

    #[test]
    fn checksum_failure_refuses_open() {
        let backend = InMemoryBackend::new();
        {
            let env =
                Environment::open_with_backend(Box::new(backend.clone()), Config::default())
                    .unwrap();
            let mut txn = env.begin_rw().unwrap();
            txn.open_table(None, true).unwrap();
            txn.commit().unwrap();
        }
        backend.corrupt_with(|bytes| bytes[12] ^= 0xFF);

        assert!(matches!(
            Environment::open_with_backend(Box::new(backend), Config::default()),
            Err(EngineError::ChecksumMismatch { .. })
        ));
    }

    /// In-memory log whose sync and truncate can be made to fail.
    struct FailingBackend {
        inner: InMemoryBackend,
        fail_sync: Arc<AtomicBool>,
        fail_truncate: Arc<AtomicBool>,
    }

    fn injected(what: &str) -> StorageError {
        StorageError::Io(std::io::Error::other(format!("injected {what} failure")))
    }

    impl StorageBackend for FailingBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            self.inner.append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            self.inner.flush()
        }

        fn sync(&mut self) -> StorageResult<()> {
            if self.fail_sync.load(Ordering::SeqCst) {
                return Err(injected("sync"));
            }
            self.inner.sync()
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            if self.fail_truncate.load(Ordering::SeqCst) {
                return Err(injected("truncate"));
            }
            self.inner.truncate(new_size)
        }
    }

    fn failing_env(
        backend: &InMemoryBackend,
    ) -> (Environment, Arc<AtomicBool>, Arc<AtomicBool>) {
        let fail_sync = Arc::new(AtomicBool::new(false));
        let fail_truncate = Arc::new(AtomicBool::new(false));
        let env = Environment::open_with_backend(
            Box::new(FailingBackend {
                inner: backend.clone(),
                fail_sync: Arc::clone(&fail_sync),
                fail_truncate: Arc::clone(&fail_truncate),
            }),
            Config::default(),
        )
        .unwrap();
        (env, fail_sync, fail_truncate)
    }

    #[test]
    fn failed_sync_is_rolled_back() {
        let backend = InMemoryBackend::new();
        let (env, fail_sync, _) = failing_env(&backend);
        let mut txn = env.begin_rw().unwrap();
        let main = txn.open_table(None, true).unwrap();
        txn.commit().unwrap();
        let len = backend.size().unwrap();

        fail_sync.store(true, Ordering::SeqCst);
        let mut txn = env.begin_rw().unwrap();
        txn.put(main, b"k", b"v", PutFlags::NONE).unwrap();
        assert!(matches!(txn.commit(), Err(EngineError::Storage(_))));
        assert_eq!(backend.size().unwrap(), len);
        assert_eq!(env.committed_seq(), SequenceNumber::new(1));

        fail_sync.store(false, Ordering::SeqCst);
        let mut txn = env.begin_rw().unwrap();
        txn.put(main, b"k", b"w", PutFlags::NONE).unwrap();
        assert_eq!(txn.commit().unwrap(), SequenceNumber::new(2));
    }

    #[test]
    fn failed_rollback_poisons_writers() {
        let backend = InMemoryBackend::new();
        let (env, fail_sync, fail_truncate) = failing_env(&backend);
        let mut txn = env.begin_rw().unwrap();
        let main = txn.open_table(None, true).unwrap();
        txn.commit().unwrap();

        fail_sync.store(true, Ordering::SeqCst);
        fail_truncate.store(true, Ordering::SeqCst);
        let mut txn = env.begin_rw().unwrap();
        txn.put(main, b"k", b"v", PutFlags::NONE).unwrap();
        assert!(txn.commit().is_err());
        assert_eq!(env.committed_seq(), SequenceNumber::new(1));

        assert!(matches!(env.begin_rw(), Err(EngineError::Poisoned)));
        assert!(matches!(env.try_begin_rw(), Err(EngineError::Poisoned)));
        let ro = env.begin_ro().unwrap();
        assert!(ro.get(main, b"k").unwrap().is_none());
        drop(ro);
        drop(env);

        // The stranded group is complete, so a fresh open replays it.
        let env = Environment::open_with_backend(Box::new(backend), Config::default()).unwrap();
        assert_eq!(env.committed_seq(), SequenceNumber::new(2));
        let mut txn = env.begin_rw().unwrap();
        txn.put(main, b"k2", b"v", PutFlags::NONE).unwrap();
        assert_eq!(txn.commit().unwrap(), SequenceNumber::new(3));
    }
}
