//! WAL Writer
//!
//! Handles appending records to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::config::WalSyncStrategy;
use crate::error::{BellError, Result};

use super::checkpoint::{append_checkpoint, CheckpointRecord};
use super::{LogRecord, Operation};

/// Writes records to the WAL file
///
/// All appends go through one mutex, so LSNs (byte offsets) are assigned
/// in the same order the bytes land in the file.
pub struct WalWriter {
    state: Mutex<WriterState>,
    sync_strategy: WalSyncStrategy,
}

struct WriterState {
    file: File,
    /// Next append offset
    position: u64,
    /// LSN of the most recent durable record
    last_lsn: Option<u64>,
    /// Records appended since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file; appends continue at its current end
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(BellError::WalWrite)?;
        let position = file.metadata()?.len();

        Ok(Self {
            state: Mutex::new(WriterState {
                file,
                position,
                last_lsn: None,
                unsynced: 0,
            }),
            sync_strategy,
        })
    }

    /// Seed the last LSN found by recovery
    pub fn with_last_lsn(self, last_lsn: Option<u64>) -> Self {
        self.state.lock().last_lsn = last_lsn;
        self
    }

    /// Build a record stamped with the current write position
    pub fn create_log_record(&self, operation: Operation, key: &[u8], value: &[u8]) -> LogRecord {
        let lsn = self.state.lock().position;
        LogRecord::new(lsn, operation, key.to_vec(), value.to_vec())
    }

    /// Same as `create_log_record` for a raw operation code.
    ///
    /// Unknown codes fail with `InvalidOperation` before any I/O.
    pub fn create_log_record_with_code(&self, code: u8, key: &[u8], value: &[u8]) -> Result<LogRecord> {
        let operation = Operation::try_from(code)?;
        Ok(self.create_log_record(operation, key, value))
    }

    /// Append one record and (per the sync strategy) fsync.
    ///
    /// Returns the record's LSN. The mutation is durable once this returns
    /// `Ok` under `EveryWrite`.
    pub fn sequential_write(&self, mut record: LogRecord) -> Result<u64> {
        let mut state = self.state.lock();

        let lsn = state.position;
        record.lsn = lsn;
        let frame = record.encode()?;

        state.append(&frame)?;
        state.last_lsn = Some(lsn);
        state.unsynced += 1;

        let sync_now = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => state.unsynced >= count,
        };
        if sync_now {
            state.sync()?;
        }

        Ok(lsn)
    }

    /// Append a list of records under one lock acquisition, then fsync
    /// once. Returns each record's LSN in order.
    pub fn batch_write(&self, records: Vec<LogRecord>) -> Result<Vec<u64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.state.lock();

        let mut buf = Vec::new();
        let mut lsns = Vec::with_capacity(records.len());
        for mut record in records {
            let lsn = state.position + buf.len() as u64;
            record.lsn = lsn;
            buf.extend_from_slice(&record.encode()?);
            lsns.push(lsn);
        }

        state.append(&buf)?;
        state.last_lsn = lsns.last().copied();
        state.unsynced += lsns.len();
        state.sync()?;

        debug!(records = lsns.len(), "WAL batch written");
        Ok(lsns)
    }

    /// Force an fsync of everything appended so far
    pub fn sync(&self) -> Result<()> {
        self.state.lock().sync()
    }

    /// Next append offset (= LSN the next record will get)
    pub fn position(&self) -> u64 {
        self.state.lock().position
    }

    /// LSN of the most recent record, `None` for an empty log
    pub fn last_lsn(&self) -> Option<u64> {
        self.state.lock().last_lsn
    }

    /// Write a checkpoint for the current last LSN to `path` and fsync.
    ///
    /// Returns `Ok(None)` without writing when the log holds no record.
    pub fn create_checkpoint(&self, path: &Path) -> Result<Option<CheckpointRecord>> {
        let mut state = self.state.lock();
        let Some(lsn) = state.last_lsn else {
            return Ok(None);
        };

        // Checkpointed records must be durable before the checkpoint is
        state.sync()?;

        let record = CheckpointRecord::new(lsn);
        append_checkpoint(path, &record)?;
        Ok(Some(record))
    }
}

impl WriterState {
    /// Append bytes at the end; on failure, cut the file back so no
    /// partial frame is left in front of later appends
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if let Err(e) = self.file.write_all(bytes) {
            error!(position = self.position, error = %e, "WAL append failed");
            if let Err(trunc) = self.file.set_len(self.position) {
                error!(error = %trunc, "failed to roll back partial WAL append");
            }
            return Err(BellError::WalWrite(e));
        }
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if self.unsynced == 0 {
            return Ok(());
        }
        self.file.sync_data().map_err(BellError::WalWrite)?;
        self.unsynced = 0;
        Ok(())
    }
}
