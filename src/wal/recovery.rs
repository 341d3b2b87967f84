//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;

use super::checkpoint::CheckpointRecord;
use super::reader::{ReadOutcome, WalReader};
use super::LogRecord;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// LSN of the last valid record seen, checkpointed record included
    pub last_lsn: Option<u64>,

    /// Whether the WAL was truncated (torn tail removed)
    pub was_truncated: bool,

    /// Offset replay started from
    pub start_offset: u64,
}

/// Scan output shared by `recover` and `verify`
struct Scan {
    records: Vec<LogRecord>,
    result: RecoveryResult,
    /// End of the last complete frame, set when a torn tail follows it
    torn_at: Option<u64>,
}

impl WalRecovery {
    /// Recover records from a WAL file
    ///
    /// This will:
    /// 1. Start after the checkpointed record if `checkpoint` lies within
    ///    the file, otherwise from offset 0
    /// 2. Read all valid records, skipping corrupt ones
    /// 3. Truncate a torn tail so later appends stay reachable
    /// 4. Return all valid records in order
    pub fn recover(
        path: &Path,
        checkpoint: Option<&CheckpointRecord>,
    ) -> Result<(Vec<LogRecord>, RecoveryResult)> {
        if !path.exists() {
            return Ok((Vec::new(), RecoveryResult::default()));
        }

        let Scan {
            records,
            mut result,
            torn_at,
        } = Self::scan(path, checkpoint)?;

        if let Some(offset) = torn_at {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(offset)?;
            file.sync_all()?;
            result.was_truncated = true;
            warn!(offset, "truncated torn WAL tail");
        }

        info!(
            recovered = result.entries_recovered,
            corrupted = result.entries_corrupted,
            start = result.start_offset,
            truncated = result.was_truncated,
            "WAL replay scanned"
        );

        Ok((records, result))
    }

    /// Verify integrity of a whole WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        if !path.exists() {
            return Ok(RecoveryResult::default());
        }

        let Scan {
            mut result,
            torn_at,
            ..
        } = Self::scan(path, None)?;
        result.was_truncated = torn_at.is_some();
        Ok(result)
    }

    fn scan(path: &Path, checkpoint: Option<&CheckpointRecord>) -> Result<Scan> {
        let file_len = std::fs::metadata(path)?.len();
        let checkpoint_lsn = match checkpoint {
            Some(cp) if cp.checkpoint_lsn < file_len => Some(cp.checkpoint_lsn),
            Some(cp) => {
                warn!(
                    checkpoint_lsn = cp.checkpoint_lsn,
                    file_len, "checkpoint beyond end of WAL, replaying from start"
                );
                None
            }
            None => None,
        };
        let start_offset = checkpoint_lsn.unwrap_or(0);

        let mut reader = WalReader::open_at(path, start_offset)?;
        let mut scan = Scan {
            records: Vec::new(),
            result: RecoveryResult {
                start_offset,
                ..RecoveryResult::default()
            },
            torn_at: None,
        };

        // The checkpointed record itself is already in an SSTable
        let mut skip_first = checkpoint_lsn.is_some();

        loop {
            match reader.next_outcome()? {
                ReadOutcome::Record { offset, record } => {
                    scan.result.last_lsn = Some(offset);
                    if skip_first {
                        skip_first = false;
                        continue;
                    }
                    scan.result.entries_recovered += 1;
                    scan.records.push(record);
                }
                ReadOutcome::Corrupt { offset, reason } => {
                    if skip_first {
                        skip_first = false;
                        continue;
                    }
                    warn!(offset, %reason, "skipping corrupt WAL record");
                    scan.result.entries_corrupted += 1;
                }
                ReadOutcome::End { offset, torn } => {
                    if torn {
                        scan.torn_at = Some(offset);
                    }
                    break;
                }
            }
        }

        Ok(scan)
    }
}
