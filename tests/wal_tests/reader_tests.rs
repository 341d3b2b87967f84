//! Tests for WalReader
//!
//! These tests verify:
//! - Sequential reads from the start or from an LSN
//! - Outcomes for corrupt frames and torn tails

use std::fs;
use std::path::PathBuf;

use belldb::config::WalSyncStrategy;
use belldb::wal::{Operation, ReadOutcome, WalReader, WalWriter};
use tempfile::TempDir;

fn setup_wal_with_records(n: u8) -> (TempDir, PathBuf, Vec<u64>) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");
    let wal = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    let lsns = (0..n)
        .map(|i| {
            wal.sequential_write(wal.create_log_record(Operation::Insert, &[i], &[i; 16]))
                .unwrap()
        })
        .collect();
    (temp_dir, path, lsns)
}

#[test]
fn test_read_from_start() {
    let (_temp, path, lsns) = setup_wal_with_records(4);

    let records: Vec<_> = WalReader::open(&path).unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 4);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.key, vec![i as u8]);
        assert_eq!(record.lsn, lsns[i]);
    }
}

#[test]
fn test_open_at_lsn() {
    let (_temp, path, lsns) = setup_wal_with_records(4);

    let keys: Vec<Vec<u8>> = WalReader::open_at(&path, lsns[2])
        .unwrap()
        .map(|r| r.unwrap().key)
        .collect();
    assert_eq!(keys, vec![vec![2], vec![3]]);
}

#[test]
fn test_outcomes_end_cleanly() {
    let (_temp, path, lsns) = setup_wal_with_records(2);
    let len = fs::metadata(&path).unwrap().len();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(reader.next_outcome().unwrap(), ReadOutcome::Record { offset, .. } if offset == lsns[0]));
    assert!(matches!(reader.next_outcome().unwrap(), ReadOutcome::Record { offset, .. } if offset == lsns[1]));
    assert!(matches!(
        reader.next_outcome().unwrap(),
        ReadOutcome::End { offset, torn: false } if offset == len
    ));
}

#[test]
fn test_torn_tail_outcome() {
    let (_temp, path, lsns) = setup_wal_with_records(3);
    let len = fs::metadata(&path).unwrap().len();
    fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(len - 5)
        .unwrap();

    let mut reader = WalReader::open_at(&path, lsns[2]).unwrap();
    assert!(matches!(
        reader.next_outcome().unwrap(),
        ReadOutcome::End { offset, torn: true } if offset == lsns[2]
    ));
}

#[test]
fn test_partial_length_prefix_is_torn() {
    let (_temp, path, _) = setup_wal_with_records(1);
    let len = fs::metadata(&path).unwrap().len();

    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(&[9, 0]);
    fs::write(&path, &bytes).unwrap();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(reader.next_outcome().unwrap(), ReadOutcome::Record { .. }));
    assert!(matches!(
        reader.next_outcome().unwrap(),
        ReadOutcome::End { offset, torn: true } if offset == len
    ));
}

#[test]
fn test_corrupt_frame_is_reported_and_skipped() {
    let (_temp, path, lsns) = setup_wal_with_records(3);

    // Flip the last byte of the middle frame (inside its stored crc)
    let mut bytes = fs::read(&path).unwrap();
    let end_of_middle = lsns[2] as usize - 1;
    bytes[end_of_middle] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(reader.next_outcome().unwrap(), ReadOutcome::Record { .. }));
    assert!(matches!(
        reader.next_outcome().unwrap(),
        ReadOutcome::Corrupt { offset, .. } if offset == lsns[1]
    ));
    assert!(matches!(reader.next_outcome().unwrap(), ReadOutcome::Record { .. }));

    let keys: Vec<Vec<u8>> = WalReader::open(&path)
        .unwrap()
        .map(|r| r.unwrap().key)
        .collect();
    assert_eq!(keys, vec![vec![0], vec![2]]);
}
