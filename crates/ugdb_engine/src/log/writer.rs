//! Commit log writer.

use crate::error::{EngineError, EngineResult};
use crate::log::reader::LogReader;
use crate::log::record::{compute_crc32, LogRecord, LOG_MAGIC, LOG_VERSION};
use tracing::warn;
use ugdb_storage::StorageBackend;

/// Frame header: magic (4) + version (2) + type (1) + payload length (4)
/// + header crc32 (4).
pub(crate) const HEADER_SIZE: usize = 15;

/// Header bytes covered by the header CRC.
pub(crate) const HEADER_BODY_SIZE: usize = 11;

/// Trailing CRC32.
pub(crate) const CRC_SIZE: usize = 4;

/// Appends framed records to the commit log.
///
/// Once a rollback fails the writer is poisoned and refuses further groups,
/// since the log may end in a group that was never published.
pub struct LogWriter {
    backend: Box<dyn StorageBackend>,
    poisoned: bool,
}

impl LogWriter {
    /// Wraps a byte store.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            poisoned: false,
        }
    }

    /// Whether a failed rollback left unpublished bytes in the log.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Frames one record.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidOperation`] if the payload does not fit
    /// the u32 length field.
    pub fn encode_frame(record: &LogRecord, out: &mut Vec<u8>) -> EngineResult<()> {
        let payload = record.encode_payload();
        let len = u32::try_from(payload.len())
            .map_err(|_| EngineError::invalid_operation("log record payload too large"))?;

        let start = out.len();
        out.reserve(HEADER_SIZE + payload.len() + CRC_SIZE);
        out.extend_from_slice(&LOG_MAGIC);
        out.extend_from_slice(&LOG_VERSION.to_le_bytes());
        out.push(record.record_type().as_byte());
        out.extend_from_slice(&len.to_le_bytes());
        let header_crc = compute_crc32(&out[start..]);
        out.extend_from_slice(&header_crc.to_le_bytes());
        out.extend_from_slice(&payload);
        let crc = compute_crc32(&out[start..]);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(())
    }

    /// Appends `records` as one contiguous write and returns its offset.
    ///
    /// When the append fails the log is cut back to where the group started,
    /// so a failed commit never leaves a partial frame ahead of later ones.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Poisoned`] if an earlier rollback failed
    /// - the encoding or storage error that stopped the append
    pub fn append_group(&mut self, records: &[LogRecord]) -> EngineResult<u64> {
        if self.poisoned {
            return Err(EngineError::Poisoned);
        }
        let mut buf = Vec::new();
        for record in records {
            Self::encode_frame(record, &mut buf)?;
        }

        let start = self.backend.size()?;
        match self.backend.append(&buf) {
            Ok(offset) => Ok(offset),
            Err(err) => {
                self.rollback(start);
                Err(err.into())
            }
        }
    }

    /// Cuts an unpublished group back out of the log, poisoning the writer
    /// if that fails.
    pub fn rollback(&mut self, offset: u64) {
        if let Err(err) = self.backend.truncate(offset) {
            warn!(error = %err, offset, "could not roll back log append; writer poisoned");
            self.poisoned = true;
        }
    }

    /// Hands appended bytes to the OS; with `sync`, forces them to disk.
    ///
    /// # Errors
    ///
    /// Returns the storage error from flush or sync.
    pub fn persist(&mut self, sync: bool) -> EngineResult<()> {
        self.backend.flush()?;
        if sync {
            self.backend.sync()?;
        }
        Ok(())
    }

    /// Current log size.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the size is unavailable.
    pub fn size(&self) -> EngineResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Cuts the log back to `offset`.
    ///
    /// # Errors
    ///
    /// Returns the storage error from truncation.
    pub fn truncate(&mut self, offset: u64) -> EngineResult<()> {
        self.backend.truncate(offset)?;
        Ok(())
    }

    /// Streams the records currently in the log.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the size is unavailable.
    pub fn reader(&self) -> EngineResult<LogReader<'_>> {
        LogReader::new(self.backend.as_ref())
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("size", &self.backend.size().ok())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SequenceNumber, TransactionId};
    use ugdb_storage::InMemoryBackend;

    #[test]
    fn group_lands_contiguously() {
        let backend = InMemoryBackend::new();
        let mut writer = LogWriter::new(Box::new(backend.clone()));
        let txid = TransactionId::new(1);

        let offset = writer
            .append_group(&[
                LogRecord::Begin { txid },
                LogRecord::Commit {
                    txid,
                    sequence: SequenceNumber::new(1),
                },
            ])
            .unwrap();
        assert_eq!(offset, 0);

        // Begin: 8-byte payload, Commit: 16-byte payload.
        let expected = (HEADER_SIZE + 8 + CRC_SIZE) + (HEADER_SIZE + 16 + CRC_SIZE);
        assert_eq!(backend.size().unwrap(), expected as u64);
        writer.persist(true).unwrap();
    }

    #[test]
    fn frame_starts_with_magic_and_version() {
        let mut buf = Vec::new();
        LogWriter::encode_frame(
            &LogRecord::Begin {
                txid: TransactionId::new(7),
            },
            &mut buf,
        )
        .unwrap();

        assert_eq!(&buf[0..4], b"UGLG");
        assert_eq!(u16::from_le_bytes([buf[4], buf[5]]), LOG_VERSION);
        assert_eq!(buf[6], 1);
        assert_eq!(u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]), 8);
        assert_eq!(
            u32::from_le_bytes([buf[11], buf[12], buf[13], buf[14]]),
            compute_crc32(&buf[..HEADER_BODY_SIZE])
        );
    }
}
