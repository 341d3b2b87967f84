//! Checksum helpers
//!
//! CRC32 (IEEE polynomial) over byte buffers, used by WAL and checkpoint
//! records to detect torn or corrupted writes.

use crate::error::{BellError, Result};

/// Compute the CRC32 of `data`
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verify that `data` hashes to `expected`
pub fn verify(data: &[u8], expected: u32) -> Result<()> {
    let actual = crc32(data);
    if actual != expected {
        return Err(BellError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}
