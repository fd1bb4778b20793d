//! Commit log damage for recovery tests.
//!
//! Each helper edits the log of a closed (or crashed) corpus directory the
//! way an interrupted write or a bad sector would.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use ugdb_engine::LOG_FILE;

/// Path of the commit log in `dir`.
pub fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE)
}

/// Size of the commit log in `dir`.
pub fn log_len(dir: &Path) -> u64 {
    fs::metadata(log_path(dir))
        .expect("Failed to stat commit log")
        .len()
}

/// Appends `bytes` to the log, like a frame cut short by a crash.
pub fn append_garbage(dir: &Path, bytes: &[u8]) {
    use std::io::Write;

    let mut file = OpenOptions::new()
        .append(true)
        .open(log_path(dir))
        .expect("Failed to open commit log");
    file.write_all(bytes).expect("Failed to append to commit log");
}

/// Cuts `count` bytes off the end of the log.
pub fn chop_tail(dir: &Path, count: u64) {
    let file = OpenOptions::new()
        .write(true)
        .open(log_path(dir))
        .expect("Failed to open commit log");
    let len = file.metadata().expect("Failed to stat commit log").len();
    file.set_len(len.saturating_sub(count))
        .expect("Failed to truncate commit log");
}

/// Inverts the byte at `offset` in the log.
pub fn flip_byte(dir: &Path, offset: u64) {
    let path = log_path(dir);
    let mut bytes = fs::read(&path).expect("Failed to read commit log");
    let index = usize::try_from(offset).expect("offset fits in memory");
    bytes[index] ^= 0xFF;
    fs::write(&path, bytes).expect("Failed to write commit log");
}
