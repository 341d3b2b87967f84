//! Transaction table
//!
//! Persisted as one `txn_id|checkpoint_lsn|status` line per update, status
//! as its numeric code. On load, later lines for an id override earlier
//! ones. Committing collapses the file to a single summary line.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{BellError, Result};
use crate::ids::IdProvider;

use super::TxnStatus;

/// One transaction and the checkpoint it started from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionTableEntry {
    pub txn_id: u64,
    pub checkpoint_lsn: u64,
    pub status: TxnStatus,
}

impl TransactionTableEntry {
    fn to_line(self) -> String {
        format!(
            "{}|{}|{}\n",
            self.txn_id,
            self.checkpoint_lsn,
            u8::from(self.status)
        )
    }

    fn parse(line: &str) -> Result<Self> {
        let malformed = || BellError::Storage(format!("malformed transaction line {:?}", line));

        let mut fields = line.split('|');
        let txn_id = fields.next().and_then(|f| f.parse().ok()).ok_or_else(malformed)?;
        let checkpoint_lsn = fields.next().and_then(|f| f.parse().ok()).ok_or_else(malformed)?;
        let code: u8 = fields.next().and_then(|f| f.parse().ok()).ok_or_else(malformed)?;
        if fields.next().is_some() {
            return Err(malformed());
        }

        Ok(Self {
            txn_id,
            checkpoint_lsn,
            status: TxnStatus::try_from(code)?,
        })
    }
}

/// Durable table of in-flight and recently committed transactions
pub struct TransactionTable {
    path: PathBuf,
    ids: Arc<dyn IdProvider>,
    state: Mutex<TableState>,
}

struct TableState {
    /// Opened for append; truncation resets the append point
    file: File,
    entries: BTreeMap<u64, TransactionTableEntry>,
    /// Id on the most recently written line
    latest: Option<u64>,
}

impl TransactionTable {
    /// Open or create the table at `path` and load its contents
    pub fn open(path: &Path, ids: Arc<dyn IdProvider>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let table = Self {
            path: path.to_path_buf(),
            ids,
            state: Mutex::new(TableState {
                file,
                entries: BTreeMap::new(),
                latest: None,
            }),
        };
        table.load()?;
        Ok(table)
    }

    /// Re-read the file into memory, skipping malformed lines.
    /// Returns the number of entries loaded.
    ///
    /// A final line without its newline is a torn write; it is cut off so
    /// the next append starts a fresh line.
    pub fn load(&self) -> Result<usize> {
        let mut bytes = Vec::new();
        File::open(&self.path)?.read_to_end(&mut bytes)?;

        let mut state = self.state.lock();
        if bytes.last().is_some_and(|&b| b != b'\n') {
            let keep = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
            warn!(
                dropped = bytes.len() - keep,
                "truncating torn transaction table line"
            );
            state.file.set_len(keep as u64).map_err(BellError::WalWrite)?;
            state.file.sync_all().map_err(BellError::WalWrite)?;
            bytes.truncate(keep);
        }
        let contents = String::from_utf8_lossy(&bytes);

        let mut entries = BTreeMap::new();
        let mut latest = None;
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match TransactionTableEntry::parse(line) {
                Ok(entry) => {
                    latest = Some(entry.txn_id);
                    entries.insert(entry.txn_id, entry);
                }
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping transaction table line"),
            }
        }

        let count = entries.len();
        state.entries = entries;
        state.latest = latest;
        Ok(count)
    }

    /// Start a transaction from `checkpoint_lsn`; the `Begin` line is
    /// durable when this returns
    pub fn begin(&self, checkpoint_lsn: u64) -> Result<u64> {
        let entry = TransactionTableEntry {
            txn_id: self.ids.next_id(),
            checkpoint_lsn,
            status: TxnStatus::Begin,
        };

        let mut state = self.state.lock();
        state.append(entry)?;
        state.entries.insert(entry.txn_id, entry);
        Ok(entry.txn_id)
    }

    /// Record a new status for an existing transaction
    pub fn set_status(&self, txn_id: u64, status: TxnStatus) -> Result<()> {
        let mut state = self.state.lock();
        let mut entry = *state
            .entries
            .get(&txn_id)
            .ok_or_else(|| BellError::Storage(format!("unknown transaction {}", txn_id)))?;

        entry.status = status;
        state.append(entry)?;
        state.entries.insert(txn_id, entry);
        Ok(())
    }

    /// Mark every entry `Commit` and rewrite the file as the most recently
    /// written entry alone. Returns that summary, or `None` if the table
    /// was empty.
    pub fn commit_transactions(&self) -> Result<Option<TransactionTableEntry>> {
        let mut state = self.state.lock();

        let newest = state
            .latest
            .and_then(|id| state.entries.get(&id))
            .or_else(|| state.entries.values().next_back())
            .copied();
        let Some(mut summary) = newest else {
            return Ok(None);
        };
        summary.status = TxnStatus::Commit;

        state.file.set_len(0)?;
        state.append(summary)?;

        state.entries.clear();
        state.entries.insert(summary.txn_id, summary);
        Ok(Some(summary))
    }

    /// Entries still in `Begin`
    pub fn open_transactions(&self) -> Vec<TransactionTableEntry> {
        self.state
            .lock()
            .entries
            .values()
            .filter(|e| e.status == TxnStatus::Begin)
            .copied()
            .collect()
    }

    pub fn get(&self, txn_id: u64) -> Option<TransactionTableEntry> {
        self.state.lock().entries.get(&txn_id).copied()
    }

    /// All entries, ascending by id
    pub fn entries(&self) -> Vec<TransactionTableEntry> {
        self.state.lock().entries.values().copied().collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableState {
    fn append(&mut self, entry: TransactionTableEntry) -> Result<()> {
        self.file
            .write_all(entry.to_line().as_bytes())
            .map_err(BellError::WalWrite)?;
        self.file.sync_all().map_err(BellError::WalWrite)?;
        self.latest = Some(entry.txn_id);
        Ok(())
    }
}
