//! WAL checkpoints
//!
//! A checkpoint file is a sequence of framed [`CheckpointRecord`]s. Each
//! marks an LSN whose effects (and everything before it) are already in
//! SSTables, so replay may start after it.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::checksum;
use crate::error::{BellError, Result};

use super::entry::{decode_payload, encode_frame, FRAME_HEADER_SIZE};
use super::reader::{read_frame, Frame};

/// Durable marker bounding log replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub lsn: u64,
    /// Last WAL record covered by this checkpoint
    pub checkpoint_lsn: u64,
    /// CRC32 over `checkpoint_lsn` as 8 LE bytes
    pub crc: u32,
}

impl CheckpointRecord {
    pub fn new(checkpoint_lsn: u64) -> Self {
        Self {
            lsn: checkpoint_lsn,
            checkpoint_lsn,
            crc: checksum::crc32(&checkpoint_lsn.to_le_bytes()),
        }
    }

    pub fn verify(&self) -> Result<()> {
        checksum::verify(&self.checkpoint_lsn.to_le_bytes(), self.crc)
    }
}

/// Append `record` to the checkpoint file at `path` and fsync.
///
/// A torn trailing frame is cut off first so the new record stays on a
/// frame boundary.
pub fn append_checkpoint(path: &Path, record: &CheckpointRecord) -> Result<()> {
    let frame = encode_frame(record)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(BellError::WalWrite)?;
    truncate_torn_tail(path, &file)?;
    file.write_all(&frame).map_err(BellError::WalWrite)?;
    file.sync_all().map_err(BellError::WalWrite)?;
    Ok(())
}

/// Latest checkpoint whose CRC verifies, or `None` if the file is
/// missing or holds no valid record
pub fn latest_checkpoint(path: &Path) -> Result<Option<CheckpointRecord>> {
    Ok(scan(path)?.and_then(|scan| scan.latest))
}

/// Cut a torn trailing frame off the checkpoint file, then return the
/// latest valid checkpoint. A missing file is left missing.
pub fn repair_checkpoints(path: &Path) -> Result<Option<CheckpointRecord>> {
    let file = match OpenOptions::new().write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    truncate_torn_tail(path, &file)
}

/// Result of walking every frame in a checkpoint file
struct CheckpointScan {
    latest: Option<CheckpointRecord>,
    /// End of the last complete frame
    valid_end: u64,
    torn: bool,
}

fn truncate_torn_tail(path: &Path, file: &File) -> Result<Option<CheckpointRecord>> {
    let Some(scan) = scan(path)? else {
        return Ok(None);
    };
    if scan.torn {
        warn!(offset = scan.valid_end, "truncating torn checkpoint tail");
        file.set_len(scan.valid_end).map_err(BellError::WalWrite)?;
        file.sync_all().map_err(BellError::WalWrite)?;
    }
    Ok(scan.latest)
}

fn scan(path: &Path) -> Result<Option<CheckpointScan>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut offset = 0u64;
    let mut latest = None;
    let mut torn = false;
    loop {
        let payload = match read_frame(&mut reader, file_len - offset)? {
            Frame::Payload(payload) => payload,
            Frame::End => break,
            Frame::Torn => {
                warn!(offset, "torn checkpoint frame ignored");
                torn = true;
                break;
            }
        };
        let frame_offset = offset;
        offset += FRAME_HEADER_SIZE + payload.len() as u64;

        match decode_payload::<CheckpointRecord>(&payload) {
            Ok(record) if record.verify().is_ok() => latest = Some(record),
            Ok(_) => warn!(offset = frame_offset, "checkpoint checksum mismatch, skipping"),
            Err(e) => warn!(offset = frame_offset, error = %e, "undecodable checkpoint, skipping"),
        }
    }

    Ok(Some(CheckpointScan {
        latest,
        valid_end: offset,
        torn,
    }))
}
