//! Error types for the corpus layer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use ugdb_engine::EngineError;

/// Result type for corpus operations.
pub type CorpusResult<T> = Result<T, CorpusError>;

/// Coarse classification of a [`CorpusError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A required key was absent. The only recoverable class.
    NotFound,
    /// The engine or the operating system failed.
    Engine,
    /// The caller broke the usage contract.
    Contract,
}

/// Errors raised by the corpus layer.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// A required read found no value.
    #[error("key not found")]
    NotFound,

    /// Storage engine error.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// I/O error while checking or creating the corpus directory.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The corpus directory is not readable, writable and searchable.
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// The corpus path is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The operation needs an active transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// The operation needs no transaction to be active.
    #[error("a transaction is already active")]
    TransactionActive,

    /// A write was attempted in a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnlyTransaction,

    /// A fixed-size read found a value of another length.
    #[error("size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        /// Length the caller asked for.
        expected: usize,
        /// Length stored.
        actual: usize,
    },

    /// An insert-only write hit an existing key.
    #[error("key already exists")]
    KeyExists,

    /// Keys must be at least one byte.
    #[error("empty key")]
    EmptyKey,

    /// A string key contained an interior NUL byte.
    #[error("invalid key: interior NUL at byte {position}")]
    InvalidKey {
        /// Offset of the NUL.
        position: usize,
    },
}

impl CorpusError {
    /// Class of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound => ErrorClass::NotFound,
            Self::Engine(_) | Self::Io(_) | Self::PermissionDenied(_) | Self::NotADirectory(_) => {
                ErrorClass::Engine
            }
            Self::NoActiveTransaction
            | Self::TransactionActive
            | Self::ReadOnlyTransaction
            | Self::SizeMismatch { .. }
            | Self::KeyExists
            | Self::EmptyKey
            | Self::InvalidKey { .. } => ErrorClass::Contract,
        }
    }

    /// Whether the caller should treat this error as unrecoverable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.class() != ErrorClass::NotFound
    }
}
