//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append a log record (and fsync) before any mutation becomes visible
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) = byte offset of the record's frame
//! - Checkpoints bounding replay distance
//! - Transaction table classifying interrupted flushes
//! - Crash recovery and replay
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Frame @ LSN 0                           │
//! │ ┌──────────┬──────────────────────────┐ │
//! │ │ Len (4)  │ bincode(LogRecord)       │ │
//! │ └──────────┴──────────────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Frame @ LSN 4 + len₀                    │
//! │ ┌──────────┬──────────────────────────┐ │
//! │ │ Len (4)  │ bincode(LogRecord)       │ │
//! │ └──────────┴──────────────────────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! A frame whose length runs past end-of-file is a torn tail left by a
//! crash mid-append. A complete frame that fails to decode or whose CRC
//! does not match is corrupt and skipped.

pub mod checkpoint;
mod entry;
mod reader;
mod recovery;
mod txn_table;
mod writer;

pub use checkpoint::{latest_checkpoint, repair_checkpoints, CheckpointRecord};
pub use entry::{LogRecord, Operation, TxnStatus, FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
pub use reader::{ReadOutcome, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use txn_table::{TransactionTable, TransactionTableEntry};
pub use writer::WalWriter;
