//! Tests for BloomFilter
//!
//! These tests verify:
//! - No false negatives, ever
//! - False-positive rate stays near its designed bound
//! - One-byte-per-bit persistence

use belldb::error::BellError;
use belldb::storage::bloom::{BloomFilter, MIN_BITS, NUM_HASHES};

fn key(i: usize) -> Vec<u8> {
    format!("user:{:08}", i).into_bytes()
}

#[test]
fn test_no_false_negatives() {
    let mut filter = BloomFilter::with_capacity(10_000, 10);
    for i in 0..10_000 {
        filter.insert(&key(i));
    }
    for i in 0..10_000 {
        assert!(filter.might_contain(&key(i)), "false negative for key {}", i);
    }
}

#[test]
fn test_false_positive_rate_within_bound() {
    let n = 10_000;
    let mut filter = BloomFilter::with_capacity(n, 10);
    for i in 0..n {
        filter.insert(&key(i));
    }

    let samples = 20_000;
    let false_positives = (n..n + samples)
        .filter(|&i| filter.might_contain(&key(i)))
        .count();
    let observed = false_positives as f64 / samples as f64;
    let expected = filter.expected_fpr(n);

    assert!(expected < 0.01, "designed rate {}", expected);
    assert!(
        observed < expected * 2.5,
        "observed {} vs designed {}",
        observed,
        expected
    );
}

#[test]
fn test_empty_filter_contains_nothing() {
    let filter = BloomFilter::new(1024);
    assert_eq!(filter.count_ones(), 0);
    assert!(!filter.might_contain(b"anything"));
}

#[test]
fn test_insert_sets_at_most_k_bits() {
    let mut filter = BloomFilter::new(4096);
    filter.insert(b"one-key");
    let ones = filter.count_ones();
    assert!(ones >= 1 && ones <= NUM_HASHES as usize);
}

#[test]
fn test_capacity_has_minimum_size() {
    assert_eq!(BloomFilter::with_capacity(0, 10).num_bits(), MIN_BITS);
    assert_eq!(BloomFilter::with_capacity(1_000, 10).num_bits(), 10_000);
}

#[test]
fn test_bytes_round_trip_preserves_membership() {
    let mut filter = BloomFilter::with_capacity(500, 10);
    for i in 0..500 {
        filter.insert(&key(i));
    }

    let bytes = filter.to_bytes();
    assert_eq!(bytes.len(), filter.num_bits());
    assert!(bytes.iter().all(|&b| b == 0 || b == 1));

    let restored = BloomFilter::from_bytes(&bytes).unwrap();
    assert_eq!(restored.num_bits(), filter.num_bits());
    assert_eq!(restored.count_ones(), filter.count_ones());
    for i in 0..1_000 {
        assert_eq!(restored.might_contain(&key(i)), filter.might_contain(&key(i)));
    }
}

#[test]
fn test_from_bytes_rejects_invalid_input() {
    assert!(matches!(
        BloomFilter::from_bytes(&[]),
        Err(BellError::Corruption(_))
    ));
    assert!(matches!(
        BloomFilter::from_bytes(&[0, 1, 2]),
        Err(BellError::Corruption(_))
    ));
}
