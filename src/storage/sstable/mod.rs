//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format (all integers little-endian)
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (28 bytes, written last)                             │
//! │   Magic: u32 | DataOffset: u64 | IndexOffset: u64 |         │
//! │   BloomOffset: u64                                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                       │
//! │   [KeyLen: u64][Key][ValLen: u64][Value]                    │
//! │   ... repeated for each entry, ascending key order ...      │
//! │   (ValLen = u64::MAX means tombstone, no value bytes)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                      │
//! │   [KeyLen: u64][Key][Offset: u64]                           │
//! │   ... one per data entry ...                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Bloom Block (to end of file)                                │
//! │   one byte per filter bit, 0 or 1                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The header is reserved as zeros and back-filled once every block is
//! sized. A file whose header never got written (crash mid-flush) fails
//! the magic check and is never trusted.

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

use bytes::{Buf, BufMut};

use crate::error::{BellError, Result};

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic number identifying a BellDB SSTable file ("BELL")
pub const MAGIC: u32 = 0x4245_4C4C;

/// Header size: Magic (4) + DataOffset (8) + IndexOffset (8) + BloomOffset (8)
pub const HEADER_SIZE: u64 = 28;

/// Sentinel value length marking a tombstone (deleted key)
pub(crate) const TOMBSTONE_MARKER: u64 = u64::MAX;

// =============================================================================
// Header
// =============================================================================

/// Fixed-size header at offset 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub data_offset: u64,
    pub index_offset: u64,
    pub bloom_offset: u64,
}

impl Header {
    pub fn new(data_offset: u64, index_offset: u64, bloom_offset: u64) -> Self {
        Self {
            magic: MAGIC,
            data_offset,
            index_offset,
            bloom_offset,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE as usize);
        buf.put_u32_le(self.magic);
        buf.put_u64_le(self.data_offset);
        buf.put_u64_le(self.index_offset);
        buf.put_u64_le(self.bloom_offset);
        buf
    }

    /// Decode and check the header against the file it came from
    pub fn decode(mut data: &[u8], file_size: u64) -> Result<Self> {
        if data.len() < HEADER_SIZE as usize {
            return Err(BellError::Corruption("SSTable header truncated".into()));
        }

        let header = Self {
            magic: data.get_u32_le(),
            data_offset: data.get_u64_le(),
            index_offset: data.get_u64_le(),
            bloom_offset: data.get_u64_le(),
        };

        if header.magic != MAGIC {
            return Err(BellError::Corruption(format!(
                "invalid SSTable magic: expected {:#010x}, got {:#010x}",
                MAGIC, header.magic
            )));
        }

        let ordered = header.data_offset == HEADER_SIZE
            && header.data_offset <= header.index_offset
            && header.index_offset <= header.bloom_offset
            && header.bloom_offset < file_size;
        if !ordered {
            return Err(BellError::Corruption(format!(
                "SSTable block offsets out of order: data={} index={} bloom={} size={}",
                header.data_offset, header.index_offset, header.bloom_offset, file_size
            )));
        }

        Ok(header)
    }
}

// =============================================================================
// SSTable Metadata
// =============================================================================

/// Summary of a freshly written SSTable, returned by the builder
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Number of entries in this SSTable (tombstones included)
    pub entry_count: u64,
    /// Smallest key
    pub min_key: Vec<u8>,
    /// Largest key
    pub max_key: Vec<u8>,
    /// Number of bloom filter bits
    pub bloom_bits: u64,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}
