//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create exactly one new SSTable per memtable flush

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::memtable::{FlushBatch, MemTableEntry};

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: RwLock around a list of shared readers. Lookups clone the
///   list under the read lock and search it unlocked; each reader guards
///   its own file handle.
/// - `next_sstable_id`: Atomic counter (lock-free)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<Arc<SSTableReader>>>,

    /// Next ID for creating new SSTables
    next_sstable_id: AtomicU64,

    /// Bloom filter sizing for new tables
    bloom_bits_per_key: usize,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files
    /// 3. Open readers for each (loads index and bloom into RAM); files
    ///    that fail validation are skipped with a warning
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path, bloom_bits_per_key: usize) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() {
                if let Some(id) = Self::parse_sstable_id(&file_path) {
                    sstable_ids.push(id);
                }
            }
        }

        // Newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let sstable_path = Self::sstable_path_with_dir(path, *id);
            match SSTableReader::open(&sstable_path) {
                Ok(reader) => sstables.push(Arc::new(reader)),
                Err(e) => warn!(
                    path = %sstable_path.display(),
                    error = %e,
                    "skipping unreadable SSTable"
                ),
            }
        }

        // Next ID = max + 1 even if the max was skipped, so it is never reused
        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        debug!(
            dir = %path.display(),
            loaded = sstables.len(),
            next_id,
            "storage opened"
        );

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
            bloom_bits_per_key,
        })
    }

    /// Get an entry by key (searches all SSTables newest → oldest)
    ///
    /// Returns:
    /// - `Ok(Some(Value(v)))` - newest table holding the key has a value
    /// - `Ok(Some(Tombstone))` - newest table holding the key deleted it
    /// - `Ok(None)` - no table holds the key
    pub fn get(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        for reader in self.snapshot() {
            if let Some(entry) = reader.get(key)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Write one sorted batch as a new SSTable and register it as newest
    pub fn write_sstable(&self, batch: FlushBatch) -> Result<SSTable> {
        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let mut builder = SSTableBuilder::new(&path, self.bloom_bits_per_key)?;
        for (key, entry) in &batch {
            match entry {
                MemTableEntry::Value(v) => builder.add(key, v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(key)?,
            }
        }
        let metadata = builder.finish()?;

        let reader = SSTableReader::open(&path)?;
        self.sstables.write().insert(0, Arc::new(reader));

        debug!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "SSTable written"
        );

        Ok(metadata)
    }

    /// Current readers, newest first
    pub fn snapshot(&self) -> Vec<Arc<SSTableReader>> {
        self.sstables.read().clone()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// Parse SSTable ID from filename
    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
