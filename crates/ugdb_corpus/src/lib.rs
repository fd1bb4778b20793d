//! # UGDB Corpus
//!
//! Transactional key-value access for n-gram corpora.
//!
//! A [`Corpus`] owns one environment of the UGDB engine and its main table.
//! Callers begin a read-only or read-write transaction, issue typed reads and
//! insert-only writes, then commit or abort:
//!
//! ```rust
//! use ugdb_corpus::{Corpus, CorpusError};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut corpus = Corpus::create(dir.path().join("corpus")).unwrap();
//!
//! corpus.begin_read_write().unwrap();
//! corpus.write(b"the cat", b"sat").unwrap();
//! assert!(matches!(corpus.write(b"the cat", b"ran"), Err(CorpusError::KeyExists)));
//! corpus.commit().unwrap();
//!
//! corpus.begin_read_only().unwrap();
//! assert_eq!(corpus.read(b"the cat").unwrap(), *b"sat");
//! corpus.commit().unwrap();
//!
//! corpus.close().unwrap();
//! ```
//!
//! ## Transactions
//!
//! At most one transaction is active per corpus. Committing a read-only
//! transaction parks its reader, and the next `begin_read_only` renews it.
//! `begin_read_write` discards a parked reader.
//!
//! ## Errors
//!
//! [`CorpusError::class`] separates the recoverable `NotFound` from engine
//! failures and contract violations. The `_or_null`, `_or_zero` and
//! [`Corpus::try_write`] variants report absence or presence as values.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod access;
mod corpus;
mod error;
mod key;
mod txn;

pub use access::{WriteOutcome, COUNTER_SIZE};
pub use corpus::Corpus;
pub use error::{CorpusError, CorpusResult, ErrorClass};
pub use key::CKey;
pub use txn::{TxnMode, TxnState};
pub use ugdb_engine::{Config, EngineError, EnvStat, Value};
