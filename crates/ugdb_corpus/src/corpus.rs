//! The corpus handle and its lifecycle.

use crate::error::{CorpusError, CorpusResult};
use crate::txn::TxnSlot;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use ugdb_engine::{Config, EnvStat, Environment, Table};

/// A handle on one corpus database: an open environment, its main table and
/// at most one active transaction.
///
/// # Example
///
/// ```rust
/// use ugdb_corpus::Corpus;
///
/// let mut corpus = Corpus::open_in_memory().unwrap();
///
/// corpus.begin_read_write().unwrap();
/// corpus.write_counter_str("a", 7).unwrap();
/// corpus.commit().unwrap();
///
/// corpus.begin_read_only().unwrap();
/// assert_eq!(corpus.read_counter_str("a").unwrap(), 7);
/// corpus.commit().unwrap();
///
/// corpus.close().unwrap();
/// ```
pub struct Corpus {
    pub(crate) env: Environment,
    pub(crate) table: Table,
    path: Option<PathBuf>,
    pub(crate) slot: TxnSlot,
}

impl Corpus {
    /// Creates a new corpus in a directory that must not exist yet, then
    /// opens it.
    ///
    /// # Errors
    ///
    /// - `Io` with `AlreadyExists` if `path` exists
    /// - [`CorpusError::Engine`] if the environment cannot be initialized
    pub fn create(path: impl AsRef<Path>) -> CorpusResult<Self> {
        Self::create_with_config(path, Config::default())
    }

    /// [`Corpus::create`] with an explicit engine configuration.
    ///
    /// # Errors
    ///
    /// See [`Corpus::create`].
    pub fn create_with_config(path: impl AsRef<Path>, config: Config) -> CorpusResult<Self> {
        let path = path.as_ref();
        fs::create_dir(path)?;

        let env = Environment::open(path, config.clone())?;
        let mut txn = env.begin_rw()?;
        txn.open_table(None, true)?;
        txn.commit()?;
        env.close()?;
        info!(path = %path.display(), "corpus created");

        Self::open_with_config(path, config)
    }

    /// Opens an existing corpus directory.
    ///
    /// # Errors
    ///
    /// - `Io` with `NotFound` if `path` does not exist
    /// - [`CorpusError::NotADirectory`] if it is not a directory
    /// - [`CorpusError::PermissionDenied`] if it is not readable, writable
    ///   and searchable
    /// - [`CorpusError::Engine`] if the environment is locked, corrupt or was
    ///   never initialized (`TableNotFound`)
    pub fn open(path: impl AsRef<Path>) -> CorpusResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// [`Corpus::open`] with an explicit engine configuration.
    ///
    /// # Errors
    ///
    /// See [`Corpus::open`].
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> CorpusResult<Self> {
        let path = path.as_ref();
        check_directory(path)?;

        let env = Environment::open(path, config)?;
        let corpus = Self::bootstrap(env, Some(path.to_path_buf()))?;
        info!(path = %path.display(), "corpus opened");
        Ok(corpus)
    }

    /// Creates a corpus that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns [`CorpusError::Engine`] if the environment cannot be set up.
    pub fn open_in_memory() -> CorpusResult<Self> {
        let env = Environment::open_in_memory(Config::default())?;
        let mut txn = env.begin_rw()?;
        txn.open_table(None, true)?;
        txn.commit()?;
        Self::bootstrap(env, None)
    }

    fn bootstrap(env: Environment, path: Option<PathBuf>) -> CorpusResult<Self> {
        let mut txn = env.begin_rw()?;
        let table = txn.open_table(None, false)?;
        txn.commit()?;
        Ok(Self {
            env,
            table,
            path,
            slot: TxnSlot::Closed,
        })
    }

    /// A second handle on the same environment, with no transaction.
    ///
    /// Each handle runs its own transactions; handles on one thread must not
    /// both hold a write transaction, since the second `begin_read_write`
    /// would wait forever for the first.
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            env: self.env.clone(),
            table: self.table,
            path: self.path.clone(),
            slot: TxnSlot::Closed,
        }
    }

    /// Directory of a file-backed corpus.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Engine statistics.
    ///
    /// # Errors
    ///
    /// Returns [`CorpusError::Engine`] if the log size is unavailable.
    pub fn stat(&self) -> CorpusResult<EnvStat> {
        Ok(self.env.stat()?)
    }

    /// Closes the corpus.
    ///
    /// A parked reader is released. The directory lock is dropped once every
    /// shared handle is closed as well.
    ///
    /// # Errors
    ///
    /// - [`CorpusError::TransactionActive`] if a transaction is active; the
    ///   corpus is dropped and an open write transaction aborted
    /// - [`CorpusError::Engine`] if a shared handle still has a transaction
    ///   or parked reader, or the final log sync fails
    pub fn close(mut self) -> CorpusResult<()> {
        if self.slot.is_active() {
            return Err(CorpusError::TransactionActive);
        }
        self.slot = TxnSlot::Closed;
        let env = self.env.clone();
        drop(self);
        env.close()?;
        Ok(())
    }
}

impl Drop for Corpus {
    fn drop(&mut self) {
        if let TxnSlot::ReadWrite(txn) = std::mem::replace(&mut self.slot, TxnSlot::Closed) {
            warn!(txid = %txn.id(), "corpus dropped with an open write transaction; aborting");
            txn.abort();
        }
    }
}

impl std::fmt::Debug for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corpus")
            .field("path", &self.path)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn check_directory(path: &Path) -> CorpusResult<()> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_dir() {
        return Err(CorpusError::NotADirectory(path.to_path_buf()));
    }
    if metadata.permissions().readonly() {
        return Err(CorpusError::PermissionDenied(path.to_path_buf()));
    }
    check_access(path)
}

/// Read, write and search access for the calling process.
#[cfg(unix)]
fn check_access(path: &Path) -> CorpusResult<()> {
    use rustix::fs::{access, Access};
    use rustix::io::Errno;

    match access(path, Access::READ_OK | Access::WRITE_OK | Access::EXEC_OK) {
        Ok(()) => Ok(()),
        Err(errno) if errno == Errno::ACCESS || errno == Errno::PERM || errno == Errno::ROFS => {
            Err(CorpusError::PermissionDenied(path.to_path_buf()))
        }
        Err(errno) => Err(io::Error::from(errno).into()),
    }
}

#[cfg(not(unix))]
fn check_access(path: &Path) -> CorpusResult<()> {
    match fs::read_dir(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            Err(CorpusError::PermissionDenied(path.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}
