//! Bloom filter
//!
//! Probabilistic set membership for SSTable keys:
//! - If any checked bit is 0, the key is definitely not in the table
//! - If all checked bits are 1, the key is probably in the table
//!
//! Hashing: one `xxh3_128` per key, split into two 64-bit halves, then
//! double hashing `h_i = h1 + i * h2 (mod m)` for `i in 0..k`. `h2` is
//! forced odd so no position sequence collapses onto a single bit.
//!
//! On disk the filter is one byte per bit (`0` or `1`), `m` bytes long.
//! In memory the bits are packed into `u64` words.

use xxhash_rust::xxh3::xxh3_128;

use crate::error::{BellError, Result};

/// Number of hash functions (fixed, not stored on disk)
pub const NUM_HASHES: u32 = 8;

/// Smallest filter built for an SSTable
pub const MIN_BITS: usize = 64;

/// Fixed-size bloom filter
#[derive(Debug, Clone)]
pub struct BloomFilter {
    words: Vec<u64>,
    num_bits: usize,
}

impl BloomFilter {
    /// Create an empty filter with `size` bits (at least one)
    pub fn new(size: usize) -> Self {
        let num_bits = size.max(1);
        Self {
            words: vec![0u64; num_bits.div_ceil(64)],
            num_bits,
        }
    }

    /// Size a filter for `expected_keys` at `bits_per_key`
    pub fn with_capacity(expected_keys: usize, bits_per_key: usize) -> Self {
        Self::new(expected_keys.saturating_mul(bits_per_key).max(MIN_BITS))
    }

    /// Add a key to the filter
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = Self::hash_key(key);
        for i in 0..NUM_HASHES {
            let pos = self.position(h1, h2, i);
            self.words[pos / 64] |= 1u64 << (pos % 64);
        }
    }

    /// Check if a key MIGHT be in the set.
    /// false → definitely absent. true → probably present.
    pub fn might_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = Self::hash_key(key);
        (0..NUM_HASHES).all(|i| {
            let pos = self.position(h1, h2, i);
            (self.words[pos / 64] >> (pos % 64)) & 1 == 1
        })
    }

    /// Number of bits (= serialized length in bytes)
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Number of bits currently set
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Serialize as one byte per bit
    pub fn to_bytes(&self) -> Vec<u8> {
        (0..self.num_bits)
            .map(|pos| ((self.words[pos / 64] >> (pos % 64)) & 1) as u8)
            .collect()
    }

    /// Rebuild a filter from its one-byte-per-bit form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(BellError::Corruption("empty bloom filter block".into()));
        }

        let mut filter = Self::new(bytes.len());
        for (pos, &b) in bytes.iter().enumerate() {
            match b {
                0 => {}
                1 => filter.words[pos / 64] |= 1u64 << (pos % 64),
                other => {
                    return Err(BellError::Corruption(format!(
                        "bloom filter byte {} at bit {} is not 0 or 1",
                        other, pos
                    )))
                }
            }
        }
        Ok(filter)
    }

    /// Expected false-positive rate after `inserted` keys: `(1 - e^(-kn/m))^k`
    pub fn expected_fpr(&self, inserted: usize) -> f64 {
        let k = f64::from(NUM_HASHES);
        let exponent = -k * inserted as f64 / self.num_bits as f64;
        (1.0 - exponent.exp()).powf(k)
    }

    fn hash_key(key: &[u8]) -> (u64, u64) {
        let hash = xxh3_128(key);
        let h1 = hash as u64;
        let h2 = ((hash >> 64) as u64) | 1;
        (h1, h2)
    }

    fn position(&self, h1: u64, h2: u64, i: u32) -> usize {
        let pos = h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % self.num_bits as u64;
        pos as usize
    }
}
