//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Shared-read / exclusive-write access
//! - Track element count for flush triggers
//! - Ordered, atomic hand-off of contents to a new SSTable
//!
//! ## Data Structure Choice
//! An arena-backed probabilistic skip list behind a `parking_lot::RwLock`.
//! Deletes are tombstones, never physical removal: the whole skip list is
//! dropped and replaced after a flush.

pub mod skiplist;
mod table;

pub use skiplist::{init_level_rng, SkipList};
pub use table::{FlushBatch, MemTable};

/// Entry stored in the MemTable (and returned by SSTable lookups)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// The live value, if any
    pub fn into_value(self) -> Option<Vec<u8>> {
        match self {
            MemTableEntry::Value(v) => Some(v),
            MemTableEntry::Tombstone => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, MemTableEntry::Tombstone)
    }
}
