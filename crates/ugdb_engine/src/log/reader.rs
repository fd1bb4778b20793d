//! Streaming commit log reader.

use crate::error::{EngineError, EngineResult};
use crate::log::record::{compute_crc32, LogRecord, LogRecordType, LOG_MAGIC, LOG_VERSION};
use crate::log::writer::{CRC_SIZE, HEADER_BODY_SIZE, HEADER_SIZE};
use ugdb_storage::StorageBackend;

/// Reads framed records one at a time.
///
/// A frame cut short by the end of the log (torn header or payload) ends
/// iteration cleanly; [`LogReader::is_torn`] reports it and
/// [`LogReader::valid_end`] gives the offset after the last complete frame.
/// The payload length is trusted only once the header CRC matches, so a
/// damaged length never passes for a torn tail. Bad magic, an unknown type,
/// a future version or a CRC mismatch are errors.
pub struct LogReader<'a> {
    backend: &'a dyn StorageBackend,
    offset: u64,
    size: u64,
    torn: bool,
    finished: bool,
}

impl<'a> LogReader<'a> {
    /// Starts reading at offset 0.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the size is unavailable.
    pub fn new(backend: &'a dyn StorageBackend) -> EngineResult<Self> {
        let size = backend.size()?;
        Ok(Self {
            backend,
            offset: 0,
            size,
            torn: false,
            finished: false,
        })
    }

    /// Offset just past the last complete frame read so far.
    #[must_use]
    pub fn valid_end(&self) -> u64 {
        self.offset
    }

    /// Whether iteration stopped at an incomplete frame.
    #[must_use]
    pub fn is_torn(&self) -> bool {
        self.torn
    }

    fn read_next(&mut self) -> EngineResult<Option<(u64, LogRecord)>> {
        let start = self.offset;
        let remaining = self.size - start;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            self.torn = true;
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;
        let stored = u32::from_le_bytes([header[11], header[12], header[13], header[14]]);
        let computed = compute_crc32(&header[..HEADER_BODY_SIZE]);
        if stored != computed {
            return Err(EngineError::ChecksumMismatch {
                offset: start,
                stored,
                computed,
            });
        }
        if header[0..4] != LOG_MAGIC {
            return Err(EngineError::log_corruption(start, "invalid magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > LOG_VERSION {
            return Err(EngineError::log_corruption(
                start,
                format!("unsupported version {version}"),
            ));
        }
        let record_type = LogRecordType::from_byte(header[6]).ok_or_else(|| {
            EngineError::log_corruption(start, format!("unknown record type {}", header[6]))
        })?;
        let payload_len =
            u64::from(u32::from_le_bytes([header[7], header[8], header[9], header[10]]));

        let frame_len = HEADER_SIZE as u64 + payload_len + CRC_SIZE as u64;
        if remaining < frame_len {
            self.torn = true;
            return Ok(None);
        }

        let body = self
            .backend
            .read_at(start + HEADER_SIZE as u64, payload_len as usize + CRC_SIZE)?;
        let (payload, crc_bytes) = body.split_at(payload_len as usize);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut framed = header;
        framed.extend_from_slice(payload);
        let computed = compute_crc32(&framed);
        if stored != computed {
            return Err(EngineError::ChecksumMismatch {
                offset: start,
                stored,
                computed,
            });
        }

        let record = LogRecord::decode_payload(record_type, payload)
            .map_err(|message| EngineError::log_corruption(start, message))?;
        self.offset = start + frame_len;
        Ok(Some((start, record)))
    }
}

impl Iterator for LogReader<'_> {
    type Item = EngineResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
