//! Test fixtures and corpus helpers.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use ugdb_corpus::{Config, Corpus};

/// A corpus in a temporary directory, removed on drop.
pub struct TempCorpus {
    corpus: Option<Corpus>,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TempCorpus {
    /// Creates a fresh corpus with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a fresh corpus with `config`.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("corpus");
        let corpus = Corpus::create_with_config(&path, config).expect("Failed to create corpus");
        Self {
            corpus: Some(corpus),
            path,
            _temp_dir: temp_dir,
        }
    }

    /// The corpus directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the corpus and opens it again from disk.
    ///
    /// Panics if a transaction is active.
    pub fn reopen(&mut self) {
        self.close();
        self.corpus = Some(Corpus::open(&self.path).expect("Failed to reopen corpus"));
    }

    /// Closes the corpus, leaving the directory in place.
    pub fn close(&mut self) {
        if let Some(corpus) = self.corpus.take() {
            corpus.close().expect("Failed to close corpus");
        }
    }

    /// Drops the corpus without closing it, as a crash would.
    pub fn crash(&mut self) {
        self.corpus = None;
    }

    /// Opens the directory again after [`TempCorpus::close`] or
    /// [`TempCorpus::crash`], returning the open result.
    pub fn try_open(&mut self) -> ugdb_corpus::CorpusResult<()> {
        self.corpus = Some(Corpus::open(&self.path)?);
        Ok(())
    }
}

impl Default for TempCorpus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempCorpus {
    type Target = Corpus;

    fn deref(&self) -> &Self::Target {
        self.corpus.as_ref().expect("corpus is closed")
    }
}

impl std::ops::DerefMut for TempCorpus {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.corpus.as_mut().expect("corpus is closed")
    }
}

/// Runs a test against a fresh corpus in a temporary directory.
pub fn with_temp_corpus<F, R>(f: F) -> R
where
    F: FnOnce(&mut Corpus) -> R,
{
    let mut temp = TempCorpus::new();
    f(&mut temp)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A corpus holding counters `ngram-0 = 0` through `ngram-{n-1} = n-1`,
    /// written in one transaction.
    pub fn populated_corpus(count: u64) -> TempCorpus {
        let mut temp = TempCorpus::new();
        temp.begin_read_write().expect("Failed to begin");
        for i in 0..count {
            temp.write_counter_str(&format!("ngram-{i}"), i)
                .expect("Failed to write counter");
        }
        temp.commit().expect("Failed to commit");
        temp
    }
}
