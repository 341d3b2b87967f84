//! Tests for StorageManager
//!
//! These tests verify:
//! - Exactly one SSTable per write
//! - Newest-first lookups and tombstone shadowing
//! - Discovery on reopen, skipping unreadable files

use std::fs;

use belldb::memtable::MemTableEntry;
use belldb::storage::StorageManager;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_manager() -> (TempDir, StorageManager) {
    let temp_dir = TempDir::new().unwrap();
    let manager = StorageManager::open(temp_dir.path(), 10).unwrap();
    (temp_dir, manager)
}

fn value(v: &[u8]) -> MemTableEntry {
    MemTableEntry::Value(v.to_vec())
}

// =============================================================================
// Write Tests
// =============================================================================

#[test]
fn test_open_empty_directory() {
    let (_temp, manager) = setup_temp_manager();
    assert_eq!(manager.sstable_count(), 0);
    assert_eq!(manager.next_sstable_id(), 1);
    assert_eq!(manager.get(b"anything").unwrap(), None);
}

#[test]
fn test_each_write_adds_exactly_one_sstable() {
    let (_temp, manager) = setup_temp_manager();

    for round in 1..=5u8 {
        let before = manager.sstable_count();
        manager
            .write_sstable(vec![(vec![round], value(b"v"))])
            .unwrap();
        assert_eq!(manager.sstable_count(), before + 1);
    }
    assert_eq!(manager.sstable_count(), 5);
    assert_eq!(manager.next_sstable_id(), 6);
}

#[test]
fn test_write_creates_named_file() {
    let (temp, manager) = setup_temp_manager();
    let meta = manager
        .write_sstable(vec![(b"a".to_vec(), value(b"1"))])
        .unwrap();

    assert_eq!(meta.path, temp.path().join("sstable_000001.sst"));
    assert!(meta.path.exists());
    assert_eq!(meta.entry_count, 1);
}

// =============================================================================
// Read Tests
// =============================================================================

#[test]
fn test_newest_table_wins() {
    let (_temp, manager) = setup_temp_manager();
    manager
        .write_sstable(vec![(b"k".to_vec(), value(b"old")), (b"only-old".to_vec(), value(b"1"))])
        .unwrap();
    manager
        .write_sstable(vec![(b"k".to_vec(), value(b"new"))])
        .unwrap();

    assert_eq!(manager.get(b"k").unwrap(), Some(value(b"new")));
    assert_eq!(manager.get(b"only-old").unwrap(), Some(value(b"1")));
}

#[test]
fn test_tombstone_shadows_older_value() {
    let (_temp, manager) = setup_temp_manager();
    manager
        .write_sstable(vec![(b"k".to_vec(), value(b"v"))])
        .unwrap();
    manager
        .write_sstable(vec![(b"k".to_vec(), MemTableEntry::Tombstone)])
        .unwrap();

    assert_eq!(manager.get(b"k").unwrap(), Some(MemTableEntry::Tombstone));
}

#[test]
fn test_snapshot_is_newest_first() {
    let (temp, manager) = setup_temp_manager();
    for i in 0..3u8 {
        manager.write_sstable(vec![(vec![i], value(b"v"))]).unwrap();
    }

    let paths: Vec<_> = manager
        .snapshot()
        .iter()
        .map(|r| r.path().to_path_buf())
        .collect();
    assert_eq!(
        paths,
        vec![
            temp.path().join("sstable_000003.sst"),
            temp.path().join("sstable_000002.sst"),
            temp.path().join("sstable_000001.sst"),
        ]
    );
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_reopen_discovers_tables() {
    let temp_dir = TempDir::new().unwrap();
    {
        let manager = StorageManager::open(temp_dir.path(), 10).unwrap();
        manager.write_sstable(vec![(b"k".to_vec(), value(b"1"))]).unwrap();
        manager.write_sstable(vec![(b"k".to_vec(), value(b"2"))]).unwrap();
    }

    let manager = StorageManager::open(temp_dir.path(), 10).unwrap();
    assert_eq!(manager.sstable_count(), 2);
    assert_eq!(manager.next_sstable_id(), 3);
    assert_eq!(manager.get(b"k").unwrap(), Some(value(b"2")));
}

#[test]
fn test_reopen_skips_corrupt_table() {
    let temp_dir = TempDir::new().unwrap();
    {
        let manager = StorageManager::open(temp_dir.path(), 10).unwrap();
        manager.write_sstable(vec![(b"k".to_vec(), value(b"good"))]).unwrap();
    }
    fs::write(temp_dir.path().join("sstable_000002.sst"), b"half-written garbage").unwrap();
    fs::write(temp_dir.path().join("notes.txt"), b"ignored").unwrap();

    let manager = StorageManager::open(temp_dir.path(), 10).unwrap();
    assert_eq!(manager.sstable_count(), 1);
    assert_eq!(manager.get(b"k").unwrap(), Some(value(b"good")));

    // The skipped id is never reused
    assert_eq!(manager.next_sstable_id(), 3);
}
