//! Transaction lifecycle of a corpus.

use crate::corpus::Corpus;
use crate::error::{CorpusError, CorpusResult};
use tracing::debug;
use ugdb_engine::{RoTxn, RwTxn};

/// Transaction state of a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// No transaction is active (a reset reader may be parked).
    Closed,
    /// A read-only transaction is active.
    ReadOnlyActive,
    /// The read-write transaction is active.
    ReadWriteActive,
}

/// Mode of an active transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    /// Reads only.
    ReadOnly,
    /// Reads and insert-only writes.
    ReadWrite,
}

#[derive(Debug)]
pub(crate) enum TxnSlot {
    Closed,
    /// A reset reader kept for the next `begin_read_only`.
    Parked(RoTxn),
    ReadOnly(RoTxn),
    ReadWrite(RwTxn),
}

impl TxnSlot {
    pub(crate) fn is_active(&self) -> bool {
        matches!(self, Self::ReadOnly(_) | Self::ReadWrite(_))
    }
}

impl Corpus {
    /// Begins a read-write transaction.
    ///
    /// Blocks until the environment's single writer slot is free. A parked
    /// reader is discarded first, so the next `begin_read_only` takes a fresh
    /// reader slot.
    ///
    /// # Errors
    ///
    /// - [`CorpusError::TransactionActive`] if a transaction is active
    /// - [`CorpusError::Engine`] if the engine cannot start the transaction
    pub fn begin_read_write(&mut self) -> CorpusResult<()> {
        match std::mem::replace(&mut self.slot, TxnSlot::Closed) {
            TxnSlot::Closed => {}
            TxnSlot::Parked(reader) => {
                debug!(txid = %reader.id(), "discarding parked reader for a write transaction");
            }
            active => {
                self.slot = active;
                return Err(CorpusError::TransactionActive);
            }
        }
        self.slot = TxnSlot::ReadWrite(self.env.begin_rw()?);
        Ok(())
    }

    /// Begins a read-only transaction on the latest committed state.
    ///
    /// Reuses the parked reader when there is one.
    ///
    /// # Errors
    ///
    /// - [`CorpusError::TransactionActive`] if a transaction is active
    /// - [`CorpusError::Engine`] if no reader slot is free or renewal fails
    pub fn begin_read_only(&mut self) -> CorpusResult<()> {
        let reader = match std::mem::replace(&mut self.slot, TxnSlot::Closed) {
            TxnSlot::Closed => self.env.begin_ro()?,
            TxnSlot::Parked(mut reader) => {
                reader.renew()?;
                reader
            }
            active => {
                self.slot = active;
                return Err(CorpusError::TransactionActive);
            }
        };
        self.slot = TxnSlot::ReadOnly(reader);
        Ok(())
    }

    /// Ends the active transaction.
    ///
    /// A read-write transaction is made durable. A read-only one is reset and
    /// parked for reuse.
    ///
    /// # Errors
    ///
    /// - [`CorpusError::NoActiveTransaction`] if none is active
    /// - [`CorpusError::Engine`] if the write could not be made durable; the
    ///   transaction is gone either way
    pub fn commit(&mut self) -> CorpusResult<()> {
        match std::mem::replace(&mut self.slot, TxnSlot::Closed) {
            TxnSlot::ReadOnly(mut reader) => {
                reader.reset();
                self.slot = TxnSlot::Parked(reader);
            }
            TxnSlot::ReadWrite(writer) => {
                writer.commit()?;
            }
            idle => {
                self.slot = idle;
                return Err(CorpusError::NoActiveTransaction);
            }
        }
        Ok(())
    }

    /// Abandons the active transaction, discarding any writes.
    ///
    /// A read-only reader is released rather than parked.
    ///
    /// # Errors
    ///
    /// Returns [`CorpusError::NoActiveTransaction`] if none is active.
    pub fn abort(&mut self) -> CorpusResult<()> {
        match std::mem::replace(&mut self.slot, TxnSlot::Closed) {
            TxnSlot::ReadOnly(reader) => {
                debug!(txid = %reader.id(), "read transaction aborted");
            }
            TxnSlot::ReadWrite(writer) => writer.abort(),
            idle => {
                self.slot = idle;
                return Err(CorpusError::NoActiveTransaction);
            }
        }
        Ok(())
    }

    /// Current transaction state.
    #[must_use]
    pub fn state(&self) -> TxnState {
        match self.slot {
            TxnSlot::Closed | TxnSlot::Parked(_) => TxnState::Closed,
            TxnSlot::ReadOnly(_) => TxnState::ReadOnlyActive,
            TxnSlot::ReadWrite(_) => TxnState::ReadWriteActive,
        }
    }

    /// Mode of the active transaction, if any.
    #[must_use]
    pub fn mode(&self) -> Option<TxnMode> {
        match self.slot {
            TxnSlot::ReadOnly(_) => Some(TxnMode::ReadOnly),
            TxnSlot::ReadWrite(_) => Some(TxnMode::ReadWrite),
            TxnSlot::Closed | TxnSlot::Parked(_) => None,
        }
    }

    /// Whether a reset reader is parked for reuse.
    #[must_use]
    pub fn has_parked_reader(&self) -> bool {
        matches!(self.slot, TxnSlot::Parked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_cycle_parks_reader() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        assert_eq!(corpus.state(), TxnState::Closed);

        corpus.begin_read_only().unwrap();
        assert_eq!(corpus.state(), TxnState::ReadOnlyActive);
        assert_eq!(corpus.mode(), Some(TxnMode::ReadOnly));

        corpus.commit().unwrap();
        assert_eq!(corpus.state(), TxnState::Closed);
        assert!(corpus.has_parked_reader());
        assert_eq!(corpus.stat().unwrap().reader_slots, 1);

        corpus.begin_read_only().unwrap();
        assert_eq!(corpus.stat().unwrap().reader_slots, 1);
        corpus.abort().unwrap();
        assert!(!corpus.has_parked_reader());
        assert_eq!(corpus.stat().unwrap().reader_slots, 0);
    }

    #[test]
    fn write_discards_parked_reader() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        corpus.begin_read_only().unwrap();
        corpus.commit().unwrap();

        corpus.begin_read_write().unwrap();
        assert!(!corpus.has_parked_reader());
        assert_eq!(corpus.mode(), Some(TxnMode::ReadWrite));
        corpus.commit().unwrap();
        assert_eq!(corpus.state(), TxnState::Closed);
    }

    #[test]
    fn one_transaction_at_a_time() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        corpus.begin_read_only().unwrap();
        assert!(matches!(
            corpus.begin_read_write(),
            Err(CorpusError::TransactionActive)
        ));
        assert!(matches!(
            corpus.begin_read_only(),
            Err(CorpusError::TransactionActive)
        ));
        assert_eq!(corpus.state(), TxnState::ReadOnlyActive);
        corpus.abort().unwrap();

        corpus.begin_read_write().unwrap();
        assert!(matches!(
            corpus.begin_read_only(),
            Err(CorpusError::TransactionActive)
        ));
        assert_eq!(corpus.state(), TxnState::ReadWriteActive);
        corpus.abort().unwrap();
    }

    #[test]
    fn end_without_transaction() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        assert!(matches!(
            corpus.commit(),
            Err(CorpusError::NoActiveTransaction)
        ));
        assert!(matches!(
            corpus.abort(),
            Err(CorpusError::NoActiveTransaction)
        ));

        corpus.begin_read_only().unwrap();
        corpus.commit().unwrap();
        assert!(matches!(
            corpus.commit(),
            Err(CorpusError::NoActiveTransaction)
        ));
        assert!(corpus.has_parked_reader());
    }

    #[test]
    fn drop_aborts_open_write() {
        let mut corpus = Corpus::open_in_memory().unwrap();
        let other = corpus.share();
        corpus.begin_read_write().unwrap();
        corpus.write(b"k", b"v").unwrap();
        drop(corpus);

        let mut other = other;
        other.begin_read_only().unwrap();
        assert!(!other.exists(b"k").unwrap());
    }
}
