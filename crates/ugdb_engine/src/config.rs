//! Environment configuration.

/// Configuration for opening an environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fsync the commit log on every write commit. When false, commits are
    /// flushed to the OS but may be lost on power failure.
    pub sync_on_commit: bool,

    /// Maximum number of simultaneously live read transactions.
    pub max_readers: usize,

    /// Maximum key length in bytes.
    pub max_key_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
            max_readers: 126,
            max_key_size: 511,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to fsync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the reader slot limit.
    #[must_use]
    pub const fn max_readers(mut self, value: usize) -> Self {
        self.max_readers = value;
        self
    }

    /// Sets the maximum key length.
    #[must_use]
    pub const fn max_key_size(mut self, value: usize) -> Self {
        self.max_key_size = value;
        self
    }
}
