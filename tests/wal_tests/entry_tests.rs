//! Tests for WAL records
//!
//! These tests verify:
//! - Operation / status code mapping, including invalid codes
//! - Checksum coverage
//! - Frame encoding

use belldb::checksum::crc32;
use belldb::error::BellError;
use belldb::wal::{LogRecord, Operation, TxnStatus, FRAME_HEADER_SIZE};

// =============================================================================
// Code Mapping Tests
// =============================================================================

#[test]
fn test_operation_codes() {
    assert_eq!(Operation::try_from(1u8).unwrap(), Operation::Insert);
    assert_eq!(Operation::try_from(2u8).unwrap(), Operation::Update);
    assert_eq!(Operation::try_from(3u8).unwrap(), Operation::Delete);
    assert_eq!(u8::from(Operation::Delete), 3);
}

#[test]
fn test_invalid_operation_codes() {
    for code in [0u8, 4, 255] {
        assert!(matches!(
            Operation::try_from(code),
            Err(BellError::InvalidOperation(c)) if c == code
        ));
    }
}

#[test]
fn test_status_codes() {
    let all = [
        (1u8, TxnStatus::Begin),
        (2, TxnStatus::Commit),
        (3, TxnStatus::Checkpoint),
        (4, TxnStatus::Rollback),
        (5, TxnStatus::Abort),
    ];
    for (code, status) in all {
        assert_eq!(TxnStatus::try_from(code).unwrap(), status);
        assert_eq!(u8::from(status), code);
    }
    assert!(matches!(TxnStatus::try_from(6u8), Err(BellError::InvalidStatus(6))));
}

// =============================================================================
// Checksum Tests
// =============================================================================

#[test]
fn test_new_record_verifies() {
    let record = LogRecord::new(0, Operation::Insert, b"key".to_vec(), b"value".to_vec());
    assert!(record.verify().is_ok());
    assert_eq!(record.txn_id, None);
    assert!(record.timestamp > 0);
}

#[test]
fn test_checksum_covers_payload() {
    let record = LogRecord::new(0, Operation::Insert, b"key".to_vec(), b"value".to_vec());
    let payload = LogRecord::checksum_payload(Operation::Insert, b"key", b"value");

    // [op][key_len u32][key][value_len u32][value]
    assert_eq!(payload.len(), 1 + 4 + 3 + 4 + 5);
    assert_eq!(payload[0], 1);
    assert_eq!(record.crc, crc32(&payload));
}

#[test]
fn test_tampering_is_detected() {
    let record = LogRecord::new(0, Operation::Update, b"key".to_vec(), b"value".to_vec());

    let mut changed_value = record.clone();
    changed_value.value = b"VALUE".to_vec();
    assert!(matches!(
        changed_value.verify(),
        Err(BellError::ChecksumMismatch { .. })
    ));

    let mut changed_op = record.clone();
    changed_op.operation = Operation::Delete;
    assert!(changed_op.verify().is_err());
}

#[test]
fn test_lsn_not_covered_by_checksum() {
    let mut record = LogRecord::new(0, Operation::Insert, b"k".to_vec(), b"v".to_vec());
    record.lsn = 4096;
    record.txn_id = Some(9);
    assert!(record.verify().is_ok());
}

// =============================================================================
// Framing Tests
// =============================================================================

#[test]
fn test_frame_has_length_prefix() {
    let mut record = LogRecord::new(128, Operation::Delete, b"gone".to_vec(), Vec::new());
    record.txn_id = Some(77);

    let frame = record.encode().unwrap();
    let len = u32::from_le_bytes(frame[..4].try_into().unwrap()) as usize;
    assert_eq!(frame.len(), FRAME_HEADER_SIZE as usize + len);

    let decoded = LogRecord::decode(&frame[4..]).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn test_decode_garbage_fails() {
    assert!(matches!(
        LogRecord::decode(&[1, 2, 3]),
        Err(BellError::WalCorruption(_))
    ));
}
