//! # UGDB Engine
//!
//! An embedded, ordered key-value engine with a single writer and snapshot
//! readers.
//!
//! This crate provides:
//! - An append-only commit log with CRC-checked frames and crash recovery
//! - Named and unnamed ordered tables of byte keys and byte values
//! - One write transaction at a time, durable on commit
//! - Any number of read transactions (up to a limit), each on a stable
//!   snapshot, with reset and renew
//!
//! ## Example
//!
//! ```rust
//! use ugdb_engine::{Config, Environment, PutFlags};
//!
//! let env = Environment::open_in_memory(Config::default()).unwrap();
//!
//! let mut txn = env.begin_rw().unwrap();
//! let main = txn.open_table(None, true).unwrap();
//! txn.put(main, b"key", b"value", PutFlags::NONE).unwrap();
//! txn.commit().unwrap();
//!
//! let ro = env.begin_ro().unwrap();
//! let value = ro.get(main, b"key").unwrap().unwrap();
//! assert_eq!(&*value, b"value");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod env;
mod error;
pub mod log;
mod table;
mod txn;
mod types;
mod value;

pub use config::Config;
pub use dir::{EnvDir, LOCK_FILE, LOG_FILE};
pub use env::{EnvStat, Environment};
pub use error::{EngineError, EngineResult};
pub use table::Table;
pub use txn::{PutFlags, RoTxn, RwTxn};
pub use types::{SequenceNumber, TableId, TransactionId};
pub use value::Value;
