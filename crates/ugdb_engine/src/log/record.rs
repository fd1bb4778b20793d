//! Commit log records and their payload encoding.

use crate::types::{SequenceNumber, TableId, TransactionId};

/// Magic bytes opening every framed record.
pub const LOG_MAGIC: [u8; 4] = *b"UGLG";

/// Current frame format version.
pub const LOG_VERSION: u16 = 1;

/// Discriminant byte of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Opens a commit group.
    Begin = 1,
    /// Registers a table.
    CreateTable = 2,
    /// Inserts a key/value pair.
    Put = 3,
    /// Seals a commit group.
    Commit = 4,
}

impl LogRecordType {
    /// Decodes a type byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::CreateTable),
            3 => Some(Self::Put),
            4 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Encodes the type byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One record of the commit log.
///
/// Records are only written by a committing write transaction, as one
/// contiguous group: `Begin`, any `CreateTable`, any `Put`, then `Commit`.
/// Recovery applies a group only once its `Commit` has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Opens the group of `txid`.
    Begin {
        /// Writing transaction.
        txid: TransactionId,
    },
    /// Registers `table` under `name` (`None` is the main table).
    CreateTable {
        /// Writing transaction.
        txid: TransactionId,
        /// Catalog ID.
        table: TableId,
        /// Table name.
        name: Option<String>,
    },
    /// Inserts `key → value` into `table`.
    Put {
        /// Writing transaction.
        txid: TransactionId,
        /// Target table.
        table: TableId,
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Seals the group of `txid` at `sequence`.
    Commit {
        /// Writing transaction.
        txid: TransactionId,
        /// Sequence assigned to the commit.
        sequence: SequenceNumber,
    },
}

impl LogRecord {
    /// Type discriminant.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::Begin { .. } => LogRecordType::Begin,
            Self::CreateTable { .. } => LogRecordType::CreateTable,
            Self::Put { .. } => LogRecordType::Put,
            Self::Commit { .. } => LogRecordType::Commit,
        }
    }

    /// Transaction that wrote the record.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Begin { txid }
            | Self::CreateTable { txid, .. }
            | Self::Put { txid, .. }
            | Self::Commit { txid, .. } => *txid,
        }
    }

    /// Serializes the payload (without the frame).
    ///
    /// Variable-length fields carry a u32 length prefix, except table names
    /// which use a presence byte and a u16 length.
    #[must_use]
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::Begin { txid } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
            }
            Self::CreateTable { txid, table, name } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&table.as_u32().to_le_bytes());
                match name {
                    Some(name) => {
                        buf.push(1);
                        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
                        buf.extend_from_slice(name.as_bytes());
                    }
                    None => buf.push(0),
                }
            }
            Self::Put {
                txid,
                table,
                key,
                value,
            } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&table.as_u32().to_le_bytes());
                buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
                buf.extend_from_slice(key);
                buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
                buf.extend_from_slice(value);
            }
            Self::Commit { txid, sequence } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }
        }
        buf
    }

    /// Deserializes a payload of the given type.
    ///
    /// # Errors
    ///
    /// Returns a message describing the malformation; the caller attaches
    /// the log offset.
    pub fn decode_payload(record_type: LogRecordType, payload: &[u8]) -> Result<Self, String> {
        let mut reader = PayloadReader::new(payload);
        let record = match record_type {
            LogRecordType::Begin => Self::Begin {
                txid: TransactionId::new(reader.u64()?),
            },
            LogRecordType::CreateTable => {
                let txid = TransactionId::new(reader.u64()?);
                let table = TableId::new(reader.u32()?);
                let name = if reader.u8()? != 0 {
                    let len = usize::from(reader.u16()?);
                    let bytes = reader.bytes(len)?;
                    Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|_| "table name is not UTF-8".to_string())?,
                    )
                } else {
                    None
                };
                Self::CreateTable { txid, table, name }
            }
            LogRecordType::Put => {
                let txid = TransactionId::new(reader.u64()?);
                let table = TableId::new(reader.u32()?);
                let key_len = reader.u32()? as usize;
                let key = reader.bytes(key_len)?.to_vec();
                let value_len = reader.u32()? as usize;
                let value = reader.bytes(value_len)?.to_vec();
                Self::Put {
                    txid,
                    table,
                    key,
                    value,
                }
            }
            LogRecordType::Commit => Self::Commit {
                txid: TransactionId::new(reader.u64()?),
                sequence: SequenceNumber::new(reader.u64()?),
            },
        };
        reader.finish(record_type)?;
        Ok(record)
    }
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload, cursor: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], String> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|&end| end <= self.payload.len())
            .ok_or_else(|| "unexpected end of payload".to_string())?;
        let slice = &self.payload[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, String> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, String> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn finish(&self, record_type: LogRecordType) -> Result<(), String> {
        if self.cursor == self.payload.len() {
            Ok(())
        } else {
            Err(format!(
                "trailing bytes in {record_type:?} record: used {}, got {}",
                self.cursor,
                self.payload.len()
            ))
        }
    }
}

/// CRC32 (IEEE) over `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
