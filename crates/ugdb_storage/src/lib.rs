//! # UGDB Storage
//!
//! Byte store backends underneath the UGDB engine's commit log.
//!
//! A backend is an **opaque, append-only byte store**. It knows nothing about
//! log framing, tables or transactions; the engine owns all interpretation of
//! the bytes it appends.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - a single file on disk
//! - [`InMemoryBackend`] - a shared in-process buffer, used by tests and
//!   ephemeral environments
//!
//! ## Example
//!
//! ```rust
//! use ugdb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"counter").unwrap();
//! assert_eq!(backend.read_at(offset, 7).unwrap(), b"counter");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
