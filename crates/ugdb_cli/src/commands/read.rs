//! Read commands: get, counter, exists.

use super::{key_bytes, render};
use std::path::Path;
use ugdb_corpus::{Corpus, CorpusResult};

fn with_reader<T>(path: &Path, f: impl FnOnce(&Corpus) -> CorpusResult<T>) -> CorpusResult<T> {
    let mut corpus = Corpus::open(path)?;
    corpus.begin_read_only()?;
    let result = f(&corpus);
    corpus.abort()?;
    corpus.close()?;
    result
}

/// Runs the get command.
pub fn get(path: &Path, key: &str, raw: bool) -> Result<(), Box<dyn std::error::Error>> {
    let key = key_bytes(key, raw)?;
    let text = with_reader(path, |corpus| Ok(render(&corpus.read(&key)?)))?;
    println!("{text}");
    Ok(())
}

/// Runs the counter command.
pub fn counter(path: &Path, key: &str, raw: bool) -> Result<(), Box<dyn std::error::Error>> {
    let key = key_bytes(key, raw)?;
    let count = with_reader(path, |corpus| corpus.read_counter_or_zero(&key))?;
    println!("{count}");
    Ok(())
}

/// Runs the exists command.
pub fn exists(path: &Path, key: &str, raw: bool) -> Result<(), Box<dyn std::error::Error>> {
    let key = key_bytes(key, raw)?;
    let found = with_reader(path, |corpus| corpus.exists(&key))?;
    println!("{found}");
    Ok(())
}
