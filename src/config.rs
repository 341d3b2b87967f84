//! Configuration for BellDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{BellError, Result};

/// Main configuration for a BellDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files.
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     ├── wal.checkpoint   (checkpoint records)
    ///     ├── txn.table        (transaction table)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Number of memtable elements (tombstones included) that triggers a flush
    pub memtable_flush_threshold: usize,

    /// Seed for the skip-list level generator. `None` seeds from OS entropy.
    pub rng_seed: Option<u64>,

    // -------------------------------------------------------------------------
    // SSTable Configuration
    // -------------------------------------------------------------------------
    /// Bloom filter bits allotted per key at flush time
    pub bloom_bits_per_key: usize,

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------
    /// Node id fed to the default snowflake id provider (10 bits)
    pub node_id: u16,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (trades durability for throughput)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./belldb_data"),
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            memtable_flush_threshold: 2048,
            rng_seed: None,
            bloom_bits_per_key: 10,
            node_id: 1,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.memtable_flush_threshold == 0 {
            return Err(BellError::Config(
                "memtable_flush_threshold must be > 0".to_string(),
            ));
        }
        if self.bloom_bits_per_key == 0 {
            return Err(BellError::Config("bloom_bits_per_key must be > 0".to_string()));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(BellError::Config(
                "EveryNEntries count must be > 0".to_string(),
            ));
        }
        if self.node_id >= 1024 {
            return Err(BellError::Config(format!(
                "node_id {} does not fit in 10 bits",
                self.node_id
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable flush threshold (element count)
    pub fn memtable_flush_threshold(mut self, count: usize) -> Self {
        self.config.memtable_flush_threshold = count;
        self
    }

    /// Seed the skip-list level generator
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    /// Set the bloom filter bits per key
    pub fn bloom_bits_per_key(mut self, bits: usize) -> Self {
        self.config.bloom_bits_per_key = bits;
        self
    }

    /// Set the node id used by the default id provider
    pub fn node_id(mut self, id: u16) -> Self {
        self.config.node_id = id;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
