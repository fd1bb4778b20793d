//! The commit log: the single durable structure of an environment.
//!
//! ## Frame Format
//!
//! ```text
//! | magic "UGLG" (4) | version (2) | type (1) | length (4) | header crc32 (4) | payload (N) | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The header CRC covers magic, version,
//! type and length; the trailing CRC covers the whole header and the payload.
//!
//! ## Recovery Policy
//!
//! - A frame cut short by end-of-file is a crash mid-append: replay stops
//!   there and the tail is truncated. The frame's length is only trusted
//!   after its header CRC matches.
//! - A group without its `Commit` frame is ignored.
//! - Bad magic, unknown type, future version or CRC mismatch is corruption
//!   and the environment refuses to open.

mod reader;
mod record;
mod writer;

pub use reader::LogReader;
pub use record::{compute_crc32, LogRecord, LogRecordType, LOG_MAGIC, LOG_VERSION};
pub use writer::LogWriter;
