//! Transactions.
//!
//! One [`RwTxn`] at a time per environment, any number of [`RoTxn`] up to the
//! reader limit. Readers see the snapshot taken when they began and are never
//! blocked by the writer.

mod read;
mod readers;
mod write;

pub use read::RoTxn;
pub(crate) use readers::ReaderTable;
pub use write::{PutFlags, RwTxn};
