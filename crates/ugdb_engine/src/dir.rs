//! Environment directory layout and locking.
//!
//! ```text
//! <env_path>/
//! ├─ LOCK       # advisory lock, held while the environment is open
//! └─ data.log   # commit log
//! ```

use crate::error::{EngineError, EngineResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Name of the lock file inside an environment directory.
pub const LOCK_FILE: &str = "LOCK";
/// Name of the commit log inside an environment directory.
pub const LOG_FILE: &str = "data.log";

/// An environment directory with its exclusive lock held.
///
/// The lock is released when this value is dropped.
#[derive(Debug)]
pub struct EnvDir {
    path: PathBuf,
    _lock_file: File,
}

impl EnvDir {
    /// Locks the existing directory at `path`.
    ///
    /// The directory is never created here; callers that want a fresh
    /// environment create the directory first.
    ///
    /// # Errors
    ///
    /// - `Io` with `NotFound` if `path` does not exist
    /// - [`EngineError::NotADirectory`] if it is not a directory
    /// - [`EngineError::EnvironmentLocked`] if another handle holds the lock
    pub fn open(path: &Path) -> EngineResult<Self> {
        let metadata = fs::metadata(path)?;
        if !metadata.is_dir() {
            return Err(EngineError::NotADirectory(path.to_path_buf()));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(EngineError::EnvironmentLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the commit log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Fsyncs the directory so a newly created log file survives a crash.
    #[cfg(unix)]
    pub fn sync(&self) -> EngineResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// NTFS journals metadata; there is no directory handle to fsync.
    #[cfg(not(unix))]
    pub fn sync(&self) -> EngineResult<()> {
        Ok(())
    }
}
