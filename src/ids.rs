//! Unique identifier providers
//!
//! Transaction ids come from an injected [`IdProvider`] so the engine does
//! not depend on one id scheme. [`SnowflakeIds`] is the default.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Source of process-wide unique 64-bit identifiers
pub trait IdProvider: Send + Sync {
    /// Return an id never returned before by this provider
    fn next_id(&self) -> u64;
}

/// Custom epoch for snowflake timestamps (2020-01-01T00:00:00Z, millis)
const SNOWFLAKE_EPOCH_MS: u64 = 1_577_836_800_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

/// Snowflake-style ids: `[timestamp ms: 41][node: 10][sequence: 12]`
///
/// Ids are strictly increasing within a process even if the wall clock
/// steps backwards; the generator holds the last timestamp it used.
pub struct SnowflakeIds {
    node_id: u64,
    /// (last timestamp used, sequence within that millisecond)
    state: Mutex<(u64, u64)>,
}

impl SnowflakeIds {
    /// Create a generator for `node_id` (only the low 10 bits are used)
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: u64::from(node_id) & ((1 << NODE_BITS) - 1),
            state: Mutex::new((0, 0)),
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
            .saturating_sub(SNOWFLAKE_EPOCH_MS)
    }
}

impl IdProvider for SnowflakeIds {
    fn next_id(&self) -> u64 {
        let mut state = self.state.lock();
        let (last_ms, sequence) = *state;

        let mut now = Self::now_ms().max(last_ms);
        let next_sequence = if now == last_ms {
            let seq = (sequence + 1) & MAX_SEQUENCE;
            if seq == 0 {
                // Sequence exhausted for this millisecond
                while now <= last_ms {
                    std::hint::spin_loop();
                    now = Self::now_ms().max(last_ms);
                }
            }
            seq
        } else {
            0
        };

        *state = (now, next_sequence);
        (now << (NODE_BITS + SEQUENCE_BITS)) | (self.node_id << SEQUENCE_BITS) | next_sequence
    }
}

/// Monotonic counter ids, starting at 1
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdProvider for SequentialIds {
    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }
}
