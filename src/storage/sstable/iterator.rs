//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::{BellError, Result};
use crate::memtable::MemTableEntry;

use super::reader::read_u64;
use super::TOMBSTONE_MARKER;

/// Iterator over SSTable entries in sorted key order
pub struct SSTableIterator {
    file: BufReader<File>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
    /// Set after the first error; iteration ends
    failed: bool,
}

impl SSTableIterator {
    /// Create a new iterator positioned at the data block
    pub(super) fn new(mut file: BufReader<File>, data_offset: u64, end_offset: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(data_offset))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: data_offset,
            failed: false,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, MemTableEntry)> {
        let key_len = read_u64(&mut self.file)?;
        let mut entry_size = key_len.saturating_add(8);
        if self.current_offset.saturating_add(entry_size).saturating_add(8) > self.end_offset {
            return Err(BellError::Corruption(format!(
                "key at offset {} runs past the data block",
                self.current_offset
            )));
        }

        let mut key = vec![0u8; key_len as usize];
        self.file.read_exact(&mut key)?;

        let val_len = read_u64(&mut self.file)?;
        entry_size += 8;

        let entry = if val_len == TOMBSTONE_MARKER {
            MemTableEntry::Tombstone
        } else {
            if self.current_offset.saturating_add(entry_size).saturating_add(val_len) > self.end_offset {
                return Err(BellError::Corruption(format!(
                    "value at offset {} runs past the data block",
                    self.current_offset
                )));
            }
            let mut v = vec![0u8; val_len as usize];
            self.file.read_exact(&mut v)?;
            entry_size += val_len;
            MemTableEntry::Value(v)
        };

        self.current_offset += entry_size;
        Ok((key, entry))
    }
}

impl Iterator for SSTableIterator {
    type Item = Result<(Vec<u8>, MemTableEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        // Stop at index block
        if self.failed || self.current_offset >= self.end_offset {
            return None;
        }

        let item = self.read_entry();
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}
