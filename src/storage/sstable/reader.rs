//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index,
//! with the bloom filter consulted first to skip tables that cannot hold a key.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Buf;
use parking_lot::Mutex;

use crate::error::{BellError, Result};
use crate::memtable::MemTableEntry;
use crate::storage::bloom::BloomFilter;

use super::iterator::SSTableIterator;
use super::{Header, HEADER_SIZE, TOMBSTONE_MARKER};

/// Reader for SSTable files with in-memory index and bloom filter
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for point reads; one seek+read at a time
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    bloom: BloomFilter,
    header: Header,
    file_size: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates the header, then loads the entire index and bloom filter
    /// into memory. Any structural problem is reported as `Corruption`.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE {
            return Err(BellError::Corruption(format!(
                "SSTable {} is {} bytes, shorter than its header",
                path.display(),
                file_size
            )));
        }

        let mut header_buf = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header_buf)?;
        let header = Header::decode(&header_buf, file_size)?;

        // Index block
        let index_data = read_range(&mut file, header.index_offset, header.bloom_offset)?;
        let index = parse_index(&index_data, &header)?;

        // Bloom block runs to end of file
        let bloom_data = read_range(&mut file, header.bloom_offset, file_size)?;
        let bloom = BloomFilter::from_bytes(&bloom_data)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            bloom,
            header,
            file_size,
        })
    }

    /// Get an entry by key
    ///
    /// Returns:
    /// - `Ok(Some(Value(v)))` - key present with a value
    /// - `Ok(Some(Tombstone))` - key deleted in this table
    /// - `Ok(None)` - key not in this table
    pub fn get(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        if !self.bloom.might_contain(key) {
            return Ok(None);
        }

        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let key_len = read_u64(&mut *file)?;
        if key_len != key.len() as u64 {
            return Err(BellError::Corruption(format!(
                "index points at key of length {} for a key of length {}",
                key_len,
                key.len()
            )));
        }
        let mut stored_key = vec![0u8; key.len()];
        file.read_exact(&mut stored_key)?;
        if stored_key != key {
            return Err(BellError::Corruption(
                "index offset does not match stored key".into(),
            ));
        }

        let val_len = read_u64(&mut *file)?;
        if val_len == TOMBSTONE_MARKER {
            return Ok(Some(MemTableEntry::Tombstone));
        }
        let end = offset
            .saturating_add(16)
            .saturating_add(key_len)
            .saturating_add(val_len);
        if end > self.header.index_offset {
            return Err(BellError::Corruption(format!(
                "value of length {} runs past the data block",
                val_len
            )));
        }

        let mut value = vec![0u8; val_len as usize];
        file.read_exact(&mut value)?;

        Ok(Some(MemTableEntry::Value(value)))
    }

    /// Bloom filter check only (no disk access)
    pub fn might_contain(&self, key: &[u8]) -> bool {
        self.bloom.might_contain(key)
    }

    /// Iterate all entries in key order
    ///
    /// Opens its own file handle so point reads are not blocked.
    pub fn iter(&self) -> Result<SSTableIterator> {
        let file = File::open(&self.path)?;
        SSTableIterator::new(
            BufReader::new(file),
            self.header.data_offset,
            self.header.index_offset,
        )
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> u64 {
        self.index.len() as u64
    }

    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(Vec::as_slice)
    }

    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(Vec::as_slice)
    }

    pub fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

impl std::fmt::Debug for SSTableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTableReader")
            .field("path", &self.path)
            .field("entries", &self.index.len())
            .field("bloom_bits", &self.bloom.num_bits())
            .finish()
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

fn read_range(file: &mut File, start: u64, end: u64) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))?;
    let mut buf = vec![0u8; (end - start) as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

pub(super) fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Parse `[KeyLen: u64][Key][Offset: u64]` entries until the block is exhausted
fn parse_index(mut data: &[u8], header: &Header) -> Result<BTreeMap<Vec<u8>, u64>> {
    let truncated = || BellError::Corruption("SSTable index block truncated".into());

    let mut index = BTreeMap::new();
    while data.has_remaining() {
        if data.remaining() < 8 {
            return Err(truncated());
        }
        let key_len = data.get_u64_le();
        if (data.remaining() as u64) < key_len.saturating_add(8) {
            return Err(truncated());
        }
        let key = data[..key_len as usize].to_vec();
        data.advance(key_len as usize);
        let offset = data.get_u64_le();

        if offset < header.data_offset || offset >= header.index_offset {
            return Err(BellError::Corruption(format!(
                "index offset {} outside data block [{}, {})",
                offset, header.data_offset, header.index_offset
            )));
        }
        index.insert(key, offset);
    }
    Ok(index)
}
