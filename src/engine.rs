//! Engine Module
//!
//! The LSM coordinator that ties the WAL, memtable and SSTables together.
//!
//! ## Responsibilities
//! - Log every mutation durably before it becomes visible
//! - Serve reads memtable-first, then SSTables newest → oldest
//! - Flush the memtable synchronously when it reaches the threshold
//! - Checkpoint after each flush and track flushes as transactions
//! - Recover from the WAL on startup

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::ids::{IdProvider, SnowflakeIds};
use crate::memtable::{init_level_rng, MemTable};
use crate::storage::StorageManager;
use crate::wal::{
    repair_checkpoints, LogRecord, Operation, RecoveryResult, TransactionTable, TxnStatus,
    WalRecovery, WalWriter,
};

/// One mutation inside [`Engine::write_batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Point-in-time counters for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub memtable_entries: usize,
    pub memtable_bytes: usize,
    pub sstable_count: usize,
    pub wal_bytes: u64,
    pub last_lsn: Option<u64>,
    pub last_checkpoint_lsn: Option<u64>,
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/batch/flush): Serialized by `write_lock`
///   - Acquire order: write_lock → WAL → memtable → storage
///   - The WAL append and fsync finish before the memtable sees the write
///
/// - **Reads** (get): No write_lock
///   - MemTable read lock; on a miss the SSTable list is snapshotted
///     before that lock is released, so a flush is never half-observed
///   - Each SSTable reader guards its own file handle
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for SSTables
    storage_dir: PathBuf,

    wal_path: PathBuf,
    checkpoint_path: PathBuf,

    /// Write-ahead log (internal mutex)
    wal: WalWriter,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// One transaction per flush
    txn_table: TransactionTable,

    /// Source of transaction ids
    ids: Arc<dyn IdProvider>,

    last_checkpoint_lsn: Mutex<Option<u64>>,

    /// Serializes write operations (put/delete/batch/flush)
    write_lock: Mutex<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    pub const WAL_FILENAME: &'static str = "wal.log";
    pub const CHECKPOINT_FILENAME: &'static str = "wal.checkpoint";
    pub const TXN_TABLE_FILENAME: &'static str = "txn.table";
    pub const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config, using snowflake
    /// transaction ids
    pub fn open(config: Config) -> Result<Self> {
        let ids = Arc::new(SnowflakeIds::new(config.node_id));
        Self::open_with_ids(config, ids)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Open or create an engine with an injected id provider
    ///
    /// On startup:
    /// 1. Validate config and seed the skip-list level generator
    /// 2. Load existing SSTables (unreadable files are skipped)
    /// 3. Load the latest checkpoint, cutting off a torn checkpoint frame
    /// 4. Abort flush transactions that never committed
    /// 5. Replay the WAL after the checkpoint into the memtable,
    ///    truncating a torn tail
    /// 6. Flush if the replayed memtable is already over threshold
    pub fn open_with_ids(config: Config, ids: Arc<dyn IdProvider>) -> Result<Self> {
        config.validate()?;
        init_level_rng(config.rng_seed);

        fs::create_dir_all(&config.data_dir)?;
        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let checkpoint_path = config.data_dir.join(Self::CHECKPOINT_FILENAME);
        let txn_path = config.data_dir.join(Self::TXN_TABLE_FILENAME);

        let storage = StorageManager::open(&storage_dir, config.bloom_bits_per_key)?;

        let checkpoint = repair_checkpoints(&checkpoint_path)?;

        let txn_table = TransactionTable::open(&txn_path, Arc::clone(&ids))?;
        for txn in txn_table.open_transactions() {
            warn!(
                txn_id = txn.txn_id,
                checkpoint_lsn = txn.checkpoint_lsn,
                "aborting interrupted flush transaction"
            );
            txn_table.set_status(txn.txn_id, TxnStatus::Abort)?;
        }

        let (records, recovery) = WalRecovery::recover(&wal_path, checkpoint.as_ref())?;
        let memtable = MemTable::new();
        for record in records {
            Self::apply(&memtable, record);
        }

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?
            .with_last_lsn(recovery.last_lsn);

        info!(
            dir = %config.data_dir.display(),
            sstables = storage.sstable_count(),
            replayed = recovery.entries_recovered,
            corrupted = recovery.entries_corrupted,
            checkpoint_lsn = ?checkpoint.map(|cp| cp.checkpoint_lsn),
            "engine opened"
        );

        let engine = Self {
            storage_dir,
            wal_path,
            checkpoint_path,
            wal,
            memtable,
            storage,
            txn_table,
            ids,
            last_checkpoint_lsn: Mutex::new(checkpoint.map(|cp| cp.checkpoint_lsn)),
            write_lock: Mutex::new(()),
            config,
        };

        if engine.memtable.should_flush(engine.config.memtable_flush_threshold) {
            let _write_guard = engine.write_lock.lock();
            engine.flush_internal()?;
        }

        Ok(engine)
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes; a tombstone ends the search)
    /// 2. SSTables (newest to oldest; the first table holding the key wins)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let sstables = match self.memtable.get_or_else(key, || self.storage.snapshot()) {
            Ok(entry) => return Ok(entry.into_value()),
            Err(sstables) => sstables,
        };

        for reader in sstables {
            if let Some(entry) = reader.get(key)? {
                return Ok(entry.into_value());
            }
        }
        Ok(None)
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write to WAL (`Update` if the key is live in the memtable,
    ///    otherwise `Insert`) and fsync
    /// 3. Write to MemTable
    /// 4. Flush if the threshold is reached
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        let operation = if self.memtable.contains_live(key) {
            Operation::Update
        } else {
            Operation::Insert
        };
        let record = self.wal.create_log_record(operation, key, value);
        self.wal.sequential_write(record)?;

        let count = self.memtable.put(key.to_vec(), value.to_vec());
        self.maybe_flush(count)
    }

    /// Delete a key
    ///
    /// Logs a `Delete` record, then writes a tombstone to the MemTable.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        let record = self.wal.create_log_record(Operation::Delete, key, &[]);
        self.wal.sequential_write(record)?;

        let count = self.memtable.delete(key.to_vec());
        self.maybe_flush(count)
    }

    /// Apply several mutations with one WAL append and one fsync
    ///
    /// Every record carries the same transaction id. Operations are applied
    /// to the memtable in order once the batch is durable.
    pub fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let _write_guard = self.write_lock.lock();
        let txn_id = self.ids.next_id();

        // Liveness of keys already touched earlier in this batch
        let mut live: HashMap<&[u8], bool> = HashMap::new();
        let mut records = Vec::with_capacity(ops.len());
        for op in &ops {
            let mut record = match op {
                BatchOp::Put { key, value } => {
                    let was_live = live
                        .get(key.as_slice())
                        .copied()
                        .unwrap_or_else(|| self.memtable.contains_live(key));
                    live.insert(key.as_slice(), true);
                    let operation = if was_live {
                        Operation::Update
                    } else {
                        Operation::Insert
                    };
                    self.wal.create_log_record(operation, key, value)
                }
                BatchOp::Delete { key } => {
                    live.insert(key.as_slice(), false);
                    self.wal.create_log_record(Operation::Delete, key, &[])
                }
            };
            record.txn_id = Some(txn_id);
            records.push(record);
        }
        self.wal.batch_write(records)?;

        let mut count = 0;
        for op in ops {
            count = match op {
                BatchOp::Put { key, value } => self.memtable.put(key, value),
                BatchOp::Delete { key } => self.memtable.delete(key),
            };
        }

        debug!(txn_id, count, "batch applied");
        self.maybe_flush(count)
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs the WAL
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.sync()?;
        info!(dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    /// Scan the whole WAL and report its integrity without modifying it
    pub fn verify_wal(&self) -> Result<RecoveryResult> {
        WalRecovery::verify(&self.wal_path)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn maybe_flush(&self, count: usize) -> Result<()> {
        if count >= self.config.memtable_flush_threshold {
            self.flush_internal()?;
        }
        Ok(())
    }

    /// Flush under `write_lock`
    ///
    /// 1. Begin a transaction in the transaction table
    /// 2. Write the memtable to exactly one new SSTable and reset it, under
    ///    the memtable's exclusive lock. Tombstones are kept only when an
    ///    older SSTable could still hold the key.
    /// 3. Checkpoint the WAL at its last LSN
    /// 4. Commit the transaction
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        let start_lsn = self.last_checkpoint_lsn.lock().unwrap_or(0);
        let txn_id = self.txn_table.begin(start_lsn)?;

        let retain_tombstones = self.storage.sstable_count() > 0;
        let written = self
            .memtable
            .flush_to_sstable(retain_tombstones, |batch| self.storage.write_sstable(batch));
        let sstable = match written {
            Ok(sstable) => sstable,
            Err(e) => {
                if let Err(status_err) = self.txn_table.set_status(txn_id, TxnStatus::Rollback) {
                    warn!(txn_id, error = %status_err, "failed to record rollback");
                }
                return Err(e);
            }
        };

        let checkpoint = self.wal.create_checkpoint(&self.checkpoint_path)?;
        if let Some(cp) = checkpoint {
            *self.last_checkpoint_lsn.lock() = Some(cp.checkpoint_lsn);
        }
        self.txn_table.commit_transactions()?;

        info!(
            txn_id,
            entries = sstable.as_ref().map_or(0, |s| s.entry_count),
            path = ?sstable.as_ref().map(|s| s.path.clone()),
            checkpoint_lsn = ?checkpoint.map(|cp| cp.checkpoint_lsn),
            "memtable flushed"
        );
        Ok(())
    }

    fn apply(memtable: &MemTable, record: LogRecord) {
        match record.operation {
            Operation::Insert | Operation::Update => {
                memtable.put(record.key, record.value);
            }
            Operation::Delete => {
                memtable.delete(record.key);
            }
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Approximate memtable size in bytes
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Memtable element count, tombstones included
    pub fn memtable_len(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// WAL LSN covered by the latest checkpoint
    pub fn last_checkpoint_lsn(&self) -> Option<u64> {
        *self.last_checkpoint_lsn.lock()
    }

    pub fn transaction_table(&self) -> &TransactionTable {
        &self.txn_table
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            memtable_entries: self.memtable.entry_count(),
            memtable_bytes: self.memtable.size(),
            sstable_count: self.storage.sstable_count(),
            wal_bytes: self.wal.position(),
            last_lsn: self.wal.last_lsn(),
            last_checkpoint_lsn: self.last_checkpoint_lsn(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
