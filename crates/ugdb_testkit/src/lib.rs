//! # UGDB Testkit
//!
//! Test utilities for UGDB.
//!
//! This crate provides:
//! - Temporary corpora with automatic cleanup
//! - Property-based test generators using proptest
//! - Commit log damage helpers for recovery tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ugdb_testkit::prelude::*;
//!
//! #[test]
//! fn counts_survive_reopen() {
//!     with_temp_corpus(|corpus| {
//!         corpus.begin_read_write().unwrap();
//!         corpus.write_counter_str("the", 3).unwrap();
//!         corpus.commit().unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
