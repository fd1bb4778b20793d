//! Write commands.

use super::key_bytes;
use std::path::Path;
use tracing::info;
use ugdb_corpus::Corpus;

/// Runs the put-counter command.
pub fn put_counter(
    path: &Path,
    key: &str,
    value: u64,
    raw: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = key_bytes(key, raw)?;
    let mut corpus = Corpus::open(path)?;
    corpus.begin_read_write()?;
    if let Err(err) = corpus.write_counter(&key, value) {
        corpus.abort()?;
        return Err(err.into());
    }
    corpus.commit()?;
    corpus.close()?;
    info!(value, "Counter written");
    Ok(())
}
