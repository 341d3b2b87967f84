//! SSTable Builder
//!
//! Writes sorted key-value entries to a new SSTable file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};

use crate::error::{BellError, Result};
use crate::storage::bloom::BloomFilter;

use super::{Header, SSTable, HEADER_SIZE, TOMBSTONE_MARKER};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    /// Output file path
    path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Current write position (for index)
    current_offset: u64,
    /// Index: key → file offset of its data entry
    index: Vec<(Vec<u8>, u64)>,
    /// Bloom filter sizing
    bloom_bits_per_key: usize,
}

impl SSTableBuilder {
    /// Create a new SSTable builder
    ///
    /// Reserves the header; call `add()`/`add_tombstone()` in strictly
    /// ascending key order, then `finish()`.
    pub fn new(path: &Path, bloom_bits_per_key: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(&[0u8; HEADER_SIZE as usize])?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            bloom_bits_per_key,
        })
    }

    /// Add a key-value pair
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, Some(value))
    }

    /// Add a tombstone
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write_entry(key, None)
    }

    /// Internal: write an entry (value=None means tombstone)
    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(BellError::Storage(format!(
                    "SSTable keys must be strictly ascending: {:?} after {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(last)
                )));
            }
        }

        let value_len = value.map_or(0, <[u8]>::len);
        let mut buf = BytesMut::with_capacity(16 + key.len() + value_len);
        buf.put_u64_le(key.len() as u64);
        buf.put_slice(key);
        match value {
            Some(v) => {
                buf.put_u64_le(v.len() as u64);
                buf.put_slice(v);
            }
            None => buf.put_u64_le(TOMBSTONE_MARKER),
        }

        self.writer.write_all(&buf)?;
        self.index.push((key.to_vec(), self.current_offset));
        self.current_offset += buf.len() as u64;

        Ok(())
    }

    /// Finish building: write index block, bloom block, back-fill the
    /// header, fsync, and return metadata
    pub fn finish(mut self) -> Result<SSTable> {
        // Index block
        let index_offset = self.current_offset;
        let mut index_block = BytesMut::new();
        for (key, offset) in &self.index {
            index_block.put_u64_le(key.len() as u64);
            index_block.put_slice(key);
            index_block.put_u64_le(*offset);
        }
        self.writer.write_all(&index_block)?;

        // Bloom block
        let bloom_offset = index_offset + index_block.len() as u64;
        let mut bloom = BloomFilter::with_capacity(self.index.len(), self.bloom_bits_per_key);
        for (key, _) in &self.index {
            bloom.insert(key);
        }
        self.writer.write_all(&bloom.to_bytes())?;
        self.writer.flush()?;

        // Header goes in last: until now the file has no valid magic.
        // The blocks must be durable before the magic can vouch for them.
        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| BellError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.sync_data()?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&Header::new(HEADER_SIZE, index_offset, bloom_offset).encode())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        Ok(SSTable {
            path: self.path,
            entry_count: self.index.len() as u64,
            min_key: self.index.first().map(|(k, _)| k.clone()).unwrap_or_default(),
            max_key: self.index.last().map(|(k, _)| k.clone()).unwrap_or_default(),
            bloom_bits: bloom.num_bits() as u64,
            file_size,
        })
    }
}
