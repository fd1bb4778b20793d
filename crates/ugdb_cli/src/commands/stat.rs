//! Stat command implementation.

use serde::Serialize;
use std::path::Path;
use ugdb_corpus::{Corpus, EnvStat};

/// Environment statistics as printed.
#[derive(Debug, Serialize)]
pub struct StatResult {
    /// Corpus path.
    pub path: String,
    /// Keys stored.
    pub entries: usize,
    /// Tables in the catalog.
    pub tables: usize,
    /// Last committed sequence.
    pub committed_seq: u64,
    /// Commit log size in bytes.
    pub log_size: u64,
}

impl StatResult {
    fn new(path: &Path, stat: &EnvStat) -> Self {
        Self {
            path: path.display().to_string(),
            entries: stat.entries,
            tables: stat.tables,
            committed_seq: stat.committed_seq.as_u64(),
            log_size: stat.log_size,
        }
    }
}

/// Runs the stat command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let corpus = Corpus::open(path)?;
    let result = StatResult::new(path, &corpus.stat()?);
    corpus.close()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => {
            println!("Corpus: {}", result.path);
            println!("Entries: {}", result.entries);
            println!("Tables: {}", result.tables);
            println!("Committed sequence: {}", result.committed_seq);
            println!("Log size: {} bytes", result.log_size);
        }
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}
