//! Tests for WalRecovery
//!
//! These tests verify:
//! - Torn tails are dropped and truncated, not fatal
//! - Corrupt records are skipped and counted
//! - Replay starts after a checkpoint
//! - verify() never modifies the file

use std::fs;
use std::path::{Path, PathBuf};

use belldb::config::WalSyncStrategy;
use belldb::wal::{CheckpointRecord, Operation, WalRecovery, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_wal_with_records(n: usize) -> (TempDir, PathBuf, Vec<u64>) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");
    let wal = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    let lsns = (0..n)
        .map(|i| {
            let key = format!("key{}", i);
            let value = format!("value{}", i);
            wal.sequential_write(wal.create_log_record(
                Operation::Insert,
                key.as_bytes(),
                value.as_bytes(),
            ))
            .unwrap()
        })
        .collect();
    (temp_dir, path, lsns)
}

fn truncate_to(path: &Path, len: u64) {
    fs::OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_len(len)
        .unwrap();
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}

// =============================================================================
// Clean Log Tests
// =============================================================================

#[test]
fn test_recover_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let (records, result) = WalRecovery::recover(&temp_dir.path().join("nope.log"), None).unwrap();

    assert!(records.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.last_lsn, None);
}

#[test]
fn test_recover_clean_log() {
    let (_temp, path, lsns) = setup_wal_with_records(5);

    let (records, result) = WalRecovery::recover(&path, None).unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(result.entries_recovered, 5);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, Some(lsns[4]));
    assert!(!result.was_truncated);
    assert_eq!(result.start_offset, 0);
    assert_eq!(records[3].key, b"key3".to_vec());
}

// =============================================================================
// Crash Tests
// =============================================================================

#[test]
fn test_torn_tail_recovers_n_minus_one() {
    let (_temp, path, lsns) = setup_wal_with_records(10);

    // Cut the last record in half
    let mid_last = lsns[9] + (file_len(&path) - lsns[9]) / 2;
    truncate_to(&path, mid_last);

    let (records, result) = WalRecovery::recover(&path, None).unwrap();
    assert_eq!(records.len(), 9);
    assert_eq!(result.entries_recovered, 9);
    assert!(result.was_truncated);
    assert_eq!(result.last_lsn, Some(lsns[8]));

    // Torn bytes are gone, so the next append lands on a frame boundary
    assert_eq!(file_len(&path), lsns[9]);
}

#[test]
fn test_truncation_on_record_boundary_recovers_all_prior() {
    let (_temp, path, lsns) = setup_wal_with_records(10);
    truncate_to(&path, lsns[7]);

    let (records, result) = WalRecovery::recover(&path, None).unwrap();
    assert_eq!(records.len(), 7);
    assert!(!result.was_truncated);
}

#[test]
fn test_appends_after_recovery_are_readable() {
    let (_temp, path, lsns) = setup_wal_with_records(3);
    truncate_to(&path, file_len(&path) - 3);
    WalRecovery::recover(&path, None).unwrap();

    let wal = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    let lsn = wal
        .sequential_write(wal.create_log_record(Operation::Insert, b"after", b"crash"))
        .unwrap();
    assert_eq!(lsn, lsns[2]);

    let (records, _) = WalRecovery::recover(&path, None).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].key, b"after".to_vec());
}

#[test]
fn test_corrupt_record_skipped_and_counted() {
    let (_temp, path, lsns) = setup_wal_with_records(5);

    // Flip one byte inside record 2's payload
    let mut bytes = fs::read(&path).unwrap();
    let pos = (lsns[2] + (lsns[3] - lsns[2]) / 2) as usize;
    bytes[pos] ^= 0x5A;
    fs::write(&path, &bytes).unwrap();

    let (records, result) = WalRecovery::recover(&path, None).unwrap();
    assert_eq!(result.entries_recovered, 4);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);

    let keys: Vec<Vec<u8>> = records.into_iter().map(|r| r.key).collect();
    assert!(!keys.contains(&b"key2".to_vec()));
    assert!(keys.contains(&b"key4".to_vec()));
}

// =============================================================================
// Checkpoint Tests
// =============================================================================

#[test]
fn test_recover_after_checkpoint() {
    let (_temp, path, lsns) = setup_wal_with_records(6);
    let checkpoint = CheckpointRecord::new(lsns[2]);

    let (records, result) = WalRecovery::recover(&path, Some(&checkpoint)).unwrap();
    let keys: Vec<Vec<u8>> = records.into_iter().map(|r| r.key).collect();

    assert_eq!(keys, vec![b"key3".to_vec(), b"key4".to_vec(), b"key5".to_vec()]);
    assert_eq!(result.start_offset, lsns[2]);
    assert_eq!(result.last_lsn, Some(lsns[5]));
}

#[test]
fn test_checkpoint_at_last_record_replays_nothing() {
    let (_temp, path, lsns) = setup_wal_with_records(3);
    let checkpoint = CheckpointRecord::new(lsns[2]);

    let (records, result) = WalRecovery::recover(&path, Some(&checkpoint)).unwrap();
    assert!(records.is_empty());
    assert_eq!(result.last_lsn, Some(lsns[2]));
}

#[test]
fn test_checkpoint_beyond_file_replays_from_start() {
    let (_temp, path, _) = setup_wal_with_records(3);
    let checkpoint = CheckpointRecord::new(1 << 40);

    let (records, result) = WalRecovery::recover(&path, Some(&checkpoint)).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(result.start_offset, 0);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_does_not_modify() {
    let (_temp, path, _) = setup_wal_with_records(4);
    let torn_len = file_len(&path) - 2;
    truncate_to(&path, torn_len);

    let result = WalRecovery::verify(&path).unwrap();
    assert_eq!(result.entries_recovered, 3);
    assert!(result.was_truncated);
    assert_eq!(file_len(&path), torn_len);
}
