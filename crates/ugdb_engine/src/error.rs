//! Error types for the engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the engine.
///
/// Absence of a key is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Byte store error.
    #[error("storage error: {0}")]
    Storage(#[from] ugdb_storage::StorageError),

    /// I/O error outside the byte store (directory, lock file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The commit log holds a record that cannot be decoded.
    #[error("commit log corruption at offset {offset}: {message}")]
    LogCorruption {
        /// Offset of the offending record.
        offset: u64,
        /// What was wrong.
        message: String,
    },

    /// A commit log record failed its checksum.
    #[error("checksum mismatch at offset {offset}: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Offset of the record.
        offset: u64,
        /// Checksum found in the log.
        stored: u32,
        /// Checksum of the bytes read.
        computed: u32,
    },

    /// Another handle holds the environment lock.
    #[error("environment locked: another handle has exclusive access")]
    EnvironmentLocked,

    /// The environment path is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The requested table does not exist and was not created.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Display name of the table (`<main>` for the unnamed table).
        name: String,
    },

    /// A put with `NO_OVERWRITE` hit an existing key.
    #[error("key already exists")]
    KeyExists,

    /// A key is empty or longer than the configured maximum.
    #[error("bad key size {len}: keys must be 1..={max} bytes")]
    BadValSize {
        /// Length of the rejected key.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Every reader slot is taken.
    #[error("reader table full: {max} readers already active")]
    ReadersFull {
        /// Configured maximum.
        max: usize,
    },

    /// A failed commit could not be cut back out of the log; no further
    /// writes are accepted until the environment is reopened.
    #[error("environment poisoned: a failed commit could not be rolled back")]
    Poisoned,

    /// The operation does not fit the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation was refused.
        message: String,
    },
}

impl EngineError {
    /// Creates a log corruption error.
    pub fn log_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a table-not-found error for an optional table name.
    pub fn table_not_found(name: Option<&str>) -> Self {
        Self::TableNotFound {
            name: name.unwrap_or("<main>").to_string(),
        }
    }
}
