//! WAL record definitions
//!
//! Defines log records, their operation and transaction-status tags, and
//! the `[len: u32 LE][bincode payload]` framing shared with checkpoints.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::BufMut;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::checksum;
use crate::error::{BellError, Result};

/// Frame header: payload length as u32 LE
pub const FRAME_HEADER_SIZE: u64 = 4;

/// Largest payload a frame may declare; anything larger is garbage
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

// =============================================================================
// Operation
// =============================================================================

/// Mutations that can be logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Operation {
    /// First write of a key
    Insert = 1,
    /// Overwrite of a live key
    Update = 2,
    /// Tombstone
    Delete = 3,
}

impl TryFrom<u8> for Operation {
    type Error = BellError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Operation::Insert),
            2 => Ok(Operation::Update),
            3 => Ok(Operation::Delete),
            other => Err(BellError::InvalidOperation(other)),
        }
    }
}

impl From<Operation> for u8 {
    fn from(op: Operation) -> u8 {
        op as u8
    }
}

// =============================================================================
// Transaction Status
// =============================================================================

/// Status of a transaction-table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum TxnStatus {
    Begin = 1,
    Commit = 2,
    Checkpoint = 3,
    Rollback = 4,
    Abort = 5,
}

impl TryFrom<u8> for TxnStatus {
    type Error = BellError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(TxnStatus::Begin),
            2 => Ok(TxnStatus::Commit),
            3 => Ok(TxnStatus::Checkpoint),
            4 => Ok(TxnStatus::Rollback),
            5 => Ok(TxnStatus::Abort),
            other => Err(BellError::InvalidStatus(other)),
        }
    }
}

impl From<TxnStatus> for u8 {
    fn from(status: TxnStatus) -> u8 {
        status as u8
    }
}

// =============================================================================
// LogRecord
// =============================================================================

/// A single record in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Byte offset of this record's frame in the log
    pub lsn: u64,

    /// Transaction the record belongs to (batched writes only)
    pub txn_id: Option<u64>,

    pub operation: Operation,

    pub key: Vec<u8>,

    /// Empty for deletes
    pub value: Vec<u8>,

    /// Unix millis when the record was created
    pub timestamp: i64,

    /// CRC32 over operation, key and value (not the LSN)
    pub crc: u32,
}

impl LogRecord {
    /// Build a record and compute its checksum
    pub fn new(lsn: u64, operation: Operation, key: Vec<u8>, value: Vec<u8>) -> Self {
        let crc = checksum::crc32(&Self::checksum_payload(operation, &key, &value));
        Self {
            lsn,
            txn_id: None,
            operation,
            key,
            value,
            timestamp: now_millis(),
            crc,
        }
    }

    /// Bytes covered by the checksum:
    /// `[op: u8][key_len: u32 LE][key][value_len: u32 LE][value]`
    pub fn checksum_payload(operation: Operation, key: &[u8], value: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9 + key.len() + value.len());
        buf.put_u8(operation.into());
        buf.put_u32_le(key.len() as u32);
        buf.put_slice(key);
        buf.put_u32_le(value.len() as u32);
        buf.put_slice(value);
        buf
    }

    pub fn compute_crc(&self) -> u32 {
        checksum::crc32(&Self::checksum_payload(self.operation, &self.key, &self.value))
    }

    /// Check the stored CRC against the record contents
    pub fn verify(&self) -> Result<()> {
        checksum::verify(
            &Self::checksum_payload(self.operation, &self.key, &self.value),
            self.crc,
        )
    }

    /// Encode as a complete frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_frame(self)
    }

    /// Decode a frame payload (without the length prefix)
    pub fn decode(payload: &[u8]) -> Result<Self> {
        decode_payload(payload)
    }
}

// =============================================================================
// Framing
// =============================================================================

/// Serialize `value` with bincode and prefix the payload length
pub(crate) fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(value)?;
    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(BellError::Serialization(format!(
            "record of {} bytes exceeds frame limit",
            payload.len()
        )));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE as usize + payload.len());
    frame.put_u32_le(payload.len() as u32);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode a frame payload read back from disk. Bytes that do not decode
/// are log corruption, not a caller error.
pub(crate) fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    bincode::deserialize(payload).map_err(|e| {
        BellError::WalCorruption(format!("undecodable {}-byte frame: {}", payload.len(), e))
    })
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
