//! Storage Module
//!
//! Persistent storage layer: immutable SSTables, one per memtable flush,
//! each carrying a full key index and a bloom filter.
//!
//! ## Responsibilities
//! - Persist flushed memtables to disk in sorted format
//! - Point lookups newest → oldest, bloom filter first
//! - Reject files that fail structural validation
//!
//! See [`sstable`] for the on-disk layout.

pub mod bloom;
pub mod sstable;
mod manager;

pub use bloom::BloomFilter;
pub use manager::StorageManager;
pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
