//! Typed reads and insert-only writes against the active transaction.

use crate::corpus::Corpus;
use crate::error::{CorpusError, CorpusResult};
use crate::key::CKey;
use crate::txn::TxnSlot;
use ugdb_engine::{EngineError, PutFlags, Value};

/// Width of a counter value.
pub const COUNTER_SIZE: usize = 8;

/// Result of [`Corpus::try_write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The key was new and now holds the value.
    Inserted,
    /// The key already had a value, which was left untouched.
    AlreadyExists,
}

impl Corpus {
    fn lookup(&self, key: &[u8]) -> CorpusResult<Option<Value<'_>>> {
        let value = match &self.slot {
            TxnSlot::ReadOnly(reader) => {
                check_key(key)?;
                reader.get(self.table, key)?
            }
            TxnSlot::ReadWrite(writer) => {
                check_key(key)?;
                writer.get(self.table, key)?
            }
            TxnSlot::Closed | TxnSlot::Parked(_) => {
                return Err(CorpusError::NoActiveTransaction)
            }
        };
        Ok(value)
    }

    /// Whether `key` has a value.
    ///
    /// # Errors
    ///
    /// - [`CorpusError::NoActiveTransaction`] outside a transaction
    /// - [`CorpusError::EmptyKey`] for an empty key
    pub fn exists(&self, key: &[u8]) -> CorpusResult<bool> {
        Ok(self.lookup(key)?.is_some())
    }

    /// The value of `key`, or `None` when absent.
    ///
    /// The value borrows the corpus and so cannot outlive the transaction.
    ///
    /// # Errors
    ///
    /// - [`CorpusError::NoActiveTransaction`] outside a transaction
    /// - [`CorpusError::EmptyKey`] for an empty key
    pub fn read_or_null(&self, key: &[u8]) -> CorpusResult<Option<Value<'_>>> {
        self.lookup(key)
    }

    /// The value of `key`.
    ///
    /// # Errors
    ///
    /// [`CorpusError::NotFound`] when absent, otherwise as
    /// [`Corpus::read_or_null`].
    pub fn read(&self, key: &[u8]) -> CorpusResult<Value<'_>> {
        self.lookup(key)?.ok_or(CorpusError::NotFound)
    }

    /// The value of `key`, which must be exactly `expected` bytes long.
    ///
    /// # Errors
    ///
    /// [`CorpusError::SizeMismatch`] when present with another length,
    /// otherwise as [`Corpus::read_or_null`].
    pub fn read_fixed_or_null(
        &self,
        key: &[u8],
        expected: usize,
    ) -> CorpusResult<Option<Value<'_>>> {
        match self.lookup(key)? {
            Some(value) if value.len() != expected => Err(CorpusError::SizeMismatch {
                expected,
                actual: value.len(),
            }),
            found => Ok(found),
        }
    }

    /// Required form of [`Corpus::read_fixed_or_null`].
    ///
    /// # Errors
    ///
    /// [`CorpusError::NotFound`] when absent, otherwise as
    /// [`Corpus::read_fixed_or_null`].
    pub fn read_fixed(&self, key: &[u8], expected: usize) -> CorpusResult<Value<'_>> {
        self.read_fixed_or_null(key, expected)?
            .ok_or(CorpusError::NotFound)
    }

    /// The counter at `key`, or zero when absent.
    ///
    /// # Errors
    ///
    /// [`CorpusError::SizeMismatch`] if the value is not 8 bytes, otherwise
    /// as [`Corpus::read_or_null`].
    pub fn read_counter_or_zero(&self, key: &[u8]) -> CorpusResult<u64> {
        match self.read_fixed_or_null(key, COUNTER_SIZE)? {
            Some(value) => decode_counter(&value),
            None => Ok(0),
        }
    }

    /// The counter at `key`.
    ///
    /// # Errors
    ///
    /// [`CorpusError::NotFound`] when absent, otherwise as
    /// [`Corpus::read_counter_or_zero`].
    pub fn read_counter(&self, key: &[u8]) -> CorpusResult<u64> {
        decode_counter(&self.read_fixed(key, COUNTER_SIZE)?)
    }

    /// Inserts `key → value` unless `key` already has a value.
    ///
    /// # Errors
    ///
    /// - [`CorpusError::NoActiveTransaction`] outside a transaction
    /// - [`CorpusError::ReadOnlyTransaction`] in a read-only transaction
    /// - [`CorpusError::EmptyKey`] for an empty key
    /// - [`CorpusError::Engine`] if the engine rejects the key
    pub fn try_write(&mut self, key: &[u8], value: &[u8]) -> CorpusResult<WriteOutcome> {
        let writer = match &mut self.slot {
            TxnSlot::ReadWrite(writer) => writer,
            TxnSlot::ReadOnly(_) => return Err(CorpusError::ReadOnlyTransaction),
            TxnSlot::Closed | TxnSlot::Parked(_) => {
                return Err(CorpusError::NoActiveTransaction)
            }
        };
        check_key(key)?;
        match writer.put(self.table, key, value, PutFlags::NO_OVERWRITE) {
            Ok(()) => Ok(WriteOutcome::Inserted),
            Err(EngineError::KeyExists) => Ok(WriteOutcome::AlreadyExists),
            Err(err) => Err(err.into()),
        }
    }

    /// Inserts `key → value`; writes are insert-only.
    ///
    /// # Errors
    ///
    /// [`CorpusError::KeyExists`] if `key` already has a value, otherwise as
    /// [`Corpus::try_write`].
    pub fn write(&mut self, key: &[u8], value: &[u8]) -> CorpusResult<()> {
        match self.try_write(key, value)? {
            WriteOutcome::Inserted => Ok(()),
            WriteOutcome::AlreadyExists => Err(CorpusError::KeyExists),
        }
    }

    /// Inserts `count` at `key` as 8 little-endian bytes.
    ///
    /// # Errors
    ///
    /// As [`Corpus::write`].
    pub fn write_counter(&mut self, key: &[u8], count: u64) -> CorpusResult<()> {
        self.write(key, &count.to_le_bytes())
    }

    /// [`Corpus::exists`] for a string key.
    ///
    /// # Errors
    ///
    /// [`CorpusError::InvalidKey`] for an interior NUL, otherwise as
    /// [`Corpus::exists`].
    pub fn exists_str(&self, key: &str) -> CorpusResult<bool> {
        self.exists(CKey::new(key)?.as_bytes())
    }

    /// [`Corpus::read_counter`] for a string key.
    ///
    /// # Errors
    ///
    /// [`CorpusError::InvalidKey`] for an interior NUL, otherwise as
    /// [`Corpus::read_counter`].
    pub fn read_counter_str(&self, key: &str) -> CorpusResult<u64> {
        self.read_counter(CKey::new(key)?.as_bytes())
    }

    /// [`Corpus::write_counter`] for a string key.
    ///
    /// # Errors
    ///
    /// [`CorpusError::InvalidKey`] for an interior NUL, otherwise as
    /// [`Corpus::write_counter`].
    pub fn write_counter_str(&mut self, key: &str, count: u64) -> CorpusResult<()> {
        self.write_counter(CKey::new(key)?.as_bytes(), count)
    }
}

fn check_key(key: &[u8]) -> CorpusResult<()> {
    if key.is_empty() {
        Err(CorpusError::EmptyKey)
    } else {
        Ok(())
    }
}

fn decode_counter(value: &[u8]) -> CorpusResult<u64> {
    let bytes: [u8; COUNTER_SIZE] =
        value
            .try_into()
            .map_err(|_| CorpusError::SizeMismatch {
                expected: COUNTER_SIZE,
                actual: value.len(),
            })?;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus_with(entries: &[(&str, &str)]) -> Corpus {
        let mut corpus = Corpus::open_in_memory().unwrap();
        corpus.begin_read_write().unwrap();
        for (key, value) in entries {
            corpus.write(key.as_bytes(), value.as_bytes()).unwrap();
        }
        corpus.commit().unwrap();
        corpus
    }

    #[test]
    fn accessors_need_a_transaction() {
        let mut corpus = corpus_with(&[("k", "v")]);
        assert!(matches!(
            corpus.exists(b"k"),
            Err(CorpusError::NoActiveTransaction)
        ));
        assert!(matches!(
            corpus.read(b"k"),
            Err(CorpusError::NoActiveTransaction)
        ));
        assert!(matches!(
            corpus.write(b"x", b"y"),
            Err(CorpusError::NoActiveTransaction)
        ));

        corpus.begin_read_only().unwrap();
        corpus.commit().unwrap();
        assert!(matches!(
            corpus.read_counter_or_zero(b"k"),
            Err(CorpusError::NoActiveTransaction)
        ));
    }

    #[test]
    fn reads_distinguish_absence() {
        let mut corpus = corpus_with(&[("k", "value")]);
        corpus.begin_read_only().unwrap();

        assert!(corpus.exists(b"k").unwrap());
        assert!(!corpus.exists(b"missing").unwrap());
        assert_eq!(corpus.read(b"k").unwrap(), *b"value");
        assert!(corpus.read_or_null(b"missing").unwrap().is_none());

        let err = corpus.read(b"missing").unwrap_err();
        assert!(matches!(err, CorpusError::NotFound));
        assert!(!err.is_fatal());
    }

    #[test]
    fn fixed_reads_check_length() {
        let mut corpus = corpus_with(&[("k", "abc")]);
        corpus.begin_read_only().unwrap();

        assert_eq!(corpus.read_fixed(b"k", 3).unwrap(), *b"abc");
        assert!(corpus.read_fixed_or_null(b"missing", 3).unwrap().is_none());
        assert!(matches!(
            corpus.read_fixed(b"k", 4),
            Err(CorpusError::SizeMismatch {
                expected: 4,
                actual: 3
            })
        ));
        assert!(matches!(
            corpus.read_fixed(b"missing", 4),
            Err(CorpusError::NotFound)
        ));
    }

    #[test]
    fn counters() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        corpus.begin_read_write().unwrap();
        corpus.write_counter(b"n", 0x0102_0304_0506_0708).unwrap();
        corpus.write(b"short", b"1234").unwrap();
        assert_eq!(
            corpus.read(b"n").unwrap(),
            [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
        corpus.commit().unwrap();

        corpus.begin_read_only().unwrap();
        assert_eq!(corpus.read_counter(b"n").unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(corpus.read_counter_or_zero(b"absent").unwrap(), 0);
        assert!(matches!(
            corpus.read_counter(b"absent"),
            Err(CorpusError::NotFound)
        ));
        assert!(matches!(
            corpus.read_counter_or_zero(b"short"),
            Err(CorpusError::SizeMismatch {
                expected: 8,
                actual: 4
            })
        ));
    }

    #[test]
    fn writes_are_insert_only() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        corpus.begin_read_write().unwrap();
        assert_eq!(
            corpus.try_write(b"k", b"first").unwrap(),
            WriteOutcome::Inserted
        );
        assert_eq!(
            corpus.try_write(b"k", b"second").unwrap(),
            WriteOutcome::AlreadyExists
        );
        assert!(matches!(
            corpus.write(b"k", b"third"),
            Err(CorpusError::KeyExists)
        ));
        assert_eq!(corpus.read(b"k").unwrap(), *b"first");
        corpus.commit().unwrap();

        corpus.begin_read_write().unwrap();
        assert!(matches!(
            corpus.write(b"k", b"later"),
            Err(CorpusError::KeyExists)
        ));
        corpus.abort().unwrap();
    }

    #[test]
    fn read_only_rejects_writes() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        corpus.begin_read_only().unwrap();
        let err = corpus.write(b"k", b"v").unwrap_err();
        assert!(matches!(err, CorpusError::ReadOnlyTransaction));
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_keys_rejected() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        corpus.begin_read_write().unwrap();
        assert!(matches!(corpus.write(b"", b"v"), Err(CorpusError::EmptyKey)));
        assert!(matches!(corpus.exists(b""), Err(CorpusError::EmptyKey)));
        assert!(matches!(
            corpus.read_counter_or_zero(b""),
            Err(CorpusError::EmptyKey)
        ));
    }

    #[test]
    fn oversized_key_is_an_engine_error() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        corpus.begin_read_write().unwrap();
        let key = vec![b'k'; 512];
        assert!(matches!(
            corpus.write(&key, b"v"),
            Err(CorpusError::Engine(EngineError::BadValSize { len: 512, .. }))
        ));
    }

    #[test]
    fn string_keys() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        corpus.begin_read_write().unwrap();
        corpus.write_counter_str("a", 7).unwrap();
        assert!(corpus.exists(b"a\0").unwrap());
        assert!(!corpus.exists(b"a").unwrap());
        assert!(matches!(
            corpus.write_counter_str("a\0b", 1),
            Err(CorpusError::InvalidKey { position: 1 })
        ));
        corpus.commit().unwrap();

        corpus.begin_read_only().unwrap();
        assert!(corpus.exists_str("a").unwrap());
        assert_eq!(corpus.read_counter_str("a").unwrap(), 7);
    }
}
