//! # BellDB
//!
//! An embeddable, single-node key-value store built on the LSM pattern:
//! - Write-Ahead Logging (WAL) with CRC32 checks, checkpoints and a
//!   transaction table for durability
//! - Crash recovery that skips corrupt records and truncates a torn tail
//! - Skip-list memtable behind a reader/writer lock
//! - Immutable SSTables with a key index and bloom filter
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Engine (LSM coordinator)                    │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │ 1. append + fsync       │ 2. apply
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │ (+ ckpt,    │          │ (skip list, │
//!   │  txn table) │          │   RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush at threshold
//!                                   ▼
//!                           ┌─────────────┐
//!                           │  SSTables   │
//!                           │ (newest     │
//!                           │  first)     │
//!                           └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use belldb::{Config, Engine};
//!
//! # fn main() -> belldb::Result<()> {
//! let engine = Engine::open(Config::builder().data_dir("./data").build())?;
//! engine.put(b"a", b"1")?;
//! assert_eq!(engine.get(b"a")?, Some(b"1".to_vec()));
//! engine.delete(b"a")?;
//! assert_eq!(engine.get(b"a")?, None);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod checksum;
pub mod ids;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BellError, Result};
pub use config::{Config, WalSyncStrategy};
pub use engine::{BatchOp, Engine, EngineStats};
pub use ids::{IdProvider, SequentialIds, SnowflakeIds};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of BellDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
