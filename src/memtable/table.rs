//! MemTable implementation
//!
//! Skip-list memtable with RwLock for concurrency.

use parking_lot::RwLock;

use crate::error::Result;

use super::skiplist::SkipList;
use super::MemTableEntry;

/// Sorted batch handed to the SSTable writer on flush
pub type FlushBatch = Vec<(Vec<u8>, MemTableEntry)>;

/// In-memory table for recent writes
///
/// Reads take the shared lock; every mutation, flush included, takes the
/// exclusive lock, so no reader ever sees a half-flushed table.
pub struct MemTable {
    list: RwLock<SkipList>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            list: RwLock::new(SkipList::new()),
        }
    }

    /// Get the entry for a key (read lock).
    ///
    /// `Some(Tombstone)` means the key was deleted here and older layers
    /// must not be consulted.
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        let list = self.list.read();
        list.search(key).map(|(value, tombstone)| {
            if tombstone {
                MemTableEntry::Tombstone
            } else {
                MemTableEntry::Value(value.to_vec())
            }
        })
    }

    /// Look up `key`; on a miss, run `on_miss` before the read lock is
    /// released, so a concurrent flush cannot move the key out from under
    /// the caller between the two steps.
    pub fn get_or_else<T, F>(&self, key: &[u8], on_miss: F) -> std::result::Result<MemTableEntry, T>
    where
        F: FnOnce() -> T,
    {
        let list = self.list.read();
        match list.search(key) {
            Some((_, true)) => Ok(MemTableEntry::Tombstone),
            Some((value, false)) => Ok(MemTableEntry::Value(value.to_vec())),
            None => Err(on_miss()),
        }
    }

    /// Whether the key currently holds a live value
    pub fn contains_live(&self, key: &[u8]) -> bool {
        self.list.read().get(key).is_some()
    }

    /// Put a key-value pair (write lock). Returns the new element count.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut list = self.list.write();
        list.insert(key, value);
        list.len()
    }

    /// Delete a key (write lock, inserts tombstone). Returns the new element count.
    pub fn delete(&self, key: Vec<u8>) -> usize {
        let mut list = self.list.write();
        list.delete(key);
        list.len()
    }

    /// Number of elements, tombstones included
    pub fn entry_count(&self) -> usize {
        self.list.read().len()
    }

    /// Approximate size in bytes
    pub fn size(&self) -> usize {
        self.list.read().size_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.list.read().is_empty()
    }

    /// Check if the element count has reached `threshold`
    pub fn should_flush(&self, threshold: usize) -> bool {
        self.entry_count() >= threshold
    }

    /// Snapshot of all entries in sorted key order
    pub fn entries(&self) -> FlushBatch {
        Self::collect(&self.list.read(), true)
    }

    /// Hand the sorted contents to `write` and reset the table, atomically.
    ///
    /// Tombstones are left out of the batch unless `retain_tombstones` is
    /// set. The exclusive lock is held across the scan, the call to `write`
    /// and the reset. If `write` fails the table is left untouched. Returns
    /// `Ok(None)` without calling `write` when the batch would be empty.
    pub fn flush_to_sstable<T, F>(&self, retain_tombstones: bool, write: F) -> Result<Option<T>>
    where
        F: FnOnce(FlushBatch) -> Result<T>,
    {
        let mut list = self.list.write();
        let batch = Self::collect(&list, retain_tombstones);

        let output = if batch.is_empty() {
            None
        } else {
            Some(write(batch)?)
        };

        *list = SkipList::new();
        Ok(output)
    }

    /// Drop every entry
    pub fn clear(&self) {
        *self.list.write() = SkipList::new();
    }

    fn collect(list: &SkipList, retain_tombstones: bool) -> FlushBatch {
        list.iter()
            .filter_map(|(key, value)| match value {
                Some(v) => Some((key.to_vec(), MemTableEntry::Value(v.to_vec()))),
                None if retain_tombstones => Some((key.to_vec(), MemTableEntry::Tombstone)),
                None => None,
            })
            .collect()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
