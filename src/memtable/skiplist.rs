//! Arena-backed skip list
//!
//! Every level is a singly linked list that starts at a header sentinel.
//! Nodes live in one `Vec` and point at each other by index, so the list
//! owns all of them and no node is ever aliased from outside.
//!
//! ```text
//! L2: [H2] ─────────────► b ────────────────► nil
//!       │                 │
//! L1: [H1] ─────────────► b ──────► d ──────► nil
//!       │                 │         │
//! L0: [H0] ──► a ───────► b ──► c ► d ──► e ► nil
//! ```
//!
//! Only the level-0 node of a key carries its value and tombstone flag;
//! upper nodes are pure index entries that lead down to it.

use std::sync::OnceLock;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Hard cap on the number of levels
pub const MAX_LEVEL: usize = 32;

static LEVEL_RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();

/// Seed the process-wide level generator.
///
/// Only the first call has an effect; returns whether this call seeded it.
/// Without an explicit call the generator seeds itself from OS entropy on
/// first use.
pub fn init_level_rng(seed: Option<u64>) -> bool {
    let mut seeded = false;
    LEVEL_RNG.get_or_init(|| {
        seeded = true;
        Mutex::new(match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        })
    });
    seeded
}

/// Fair coin: promote the new key one level up?
fn promote() -> bool {
    LEVEL_RNG
        .get_or_init(|| Mutex::new(StdRng::from_entropy()))
        .lock()
        .gen_bool(0.5)
}

struct SkipNode {
    key: Vec<u8>,
    value: Vec<u8>,
    tombstone: bool,
    /// Same key, one level lower
    down: Option<usize>,
    /// Next key, same level
    right: Option<usize>,
}

impl SkipNode {
    fn sentinel(down: Option<usize>) -> Self {
        Self {
            key: Vec::new(),
            value: Vec::new(),
            tombstone: false,
            down,
            right: None,
        }
    }
}

/// Probabilistic ordered index over byte-string keys
pub struct SkipList {
    nodes: Vec<SkipNode>,
    /// Top-left sentinel
    head: usize,
    /// Number of levels (>= 1)
    level: usize,
    /// Level-0 nodes, tombstones included
    len: usize,
    /// Approximate key + value bytes held at level 0
    size_bytes: usize,
}

impl SkipList {
    /// Create an empty skip list with a single level
    pub fn new() -> Self {
        Self {
            nodes: vec![SkipNode::sentinel(None)],
            head: 0,
            level: 1,
            len: 0,
            size_bytes: 0,
        }
    }

    /// Look up `key`.
    ///
    /// Returns `Some((value, tombstone))` when a node exists for the key,
    /// tombstoned or not, and `None` when the key was never written.
    pub fn search(&self, key: &[u8]) -> Option<(&[u8], bool)> {
        self.locate(key, self.level - 1).map(|idx| {
            let node = &self.nodes[idx];
            (node.value.as_slice(), node.tombstone)
        })
    }

    /// Look up a live value; tombstoned keys read as absent
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        match self.search(key) {
            Some((value, false)) => Some(value),
            _ => None,
        }
    }

    /// Arena index of the level-0 node for `key`, starting the descent at
    /// the header sentinel of `start_level` (0 = bottom).
    ///
    /// Levels are strict refinements of one another, so the result does not
    /// depend on `start_level`.
    pub fn locate(&self, key: &[u8], start_level: usize) -> Option<usize> {
        let start_level = start_level.min(self.level - 1);
        let mut header = self.head;
        for _ in 0..(self.level - 1 - start_level) {
            header = self.nodes[header].down?;
        }

        let mut curr = Some(header);
        while let Some(mut idx) = curr {
            idx = self.advance(idx, key);
            if let Some(next) = self.nodes[idx].right {
                if self.nodes[next].key.as_slice() == key {
                    return Some(self.bottom_of(next));
                }
            }
            curr = self.nodes[idx].down;
        }
        None
    }

    /// Insert or overwrite a live value for `key`.
    ///
    /// Returns true if a new key was added, false if an existing node
    /// (live or tombstoned) was overwritten in place.
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.upsert(key, value, false)
    }

    /// Record a tombstone for `key`. Nothing is physically removed.
    pub fn delete(&mut self, key: Vec<u8>) -> bool {
        self.upsert(key, Vec::new(), true)
    }

    fn upsert(&mut self, key: Vec<u8>, value: Vec<u8>, tombstone: bool) -> bool {
        // Per level, the last node before overshooting the key (top first)
        let mut update = Vec::with_capacity(self.level);
        let mut curr = Some(self.head);

        while let Some(mut idx) = curr {
            idx = self.advance(idx, &key);
            if let Some(next) = self.nodes[idx].right {
                if self.nodes[next].key == key {
                    let bottom = self.bottom_of(next);
                    self.overwrite(bottom, value, tombstone);
                    return false;
                }
            }
            update.push(idx);
            curr = self.nodes[idx].down;
        }

        // Splice bottom-up, promoting on each coin flip
        let mut below: Option<usize> = None;
        loop {
            let (prev, new_level) = match update.pop() {
                Some(prev) => (prev, false),
                None if self.level < MAX_LEVEL => {
                    let old_head = self.head;
                    let header = self.push(SkipNode::sentinel(Some(old_head)));
                    self.head = header;
                    self.level += 1;
                    (header, true)
                }
                None => break,
            };

            let is_bottom = below.is_none();
            let right = self.nodes[prev].right;
            let node = self.push(SkipNode {
                key: key.clone(),
                value: if is_bottom { value.clone() } else { Vec::new() },
                tombstone: is_bottom && tombstone,
                down: below,
                right,
            });
            self.nodes[prev].right = Some(node);
            below = Some(node);

            // At most one new level per insert
            if new_level || !promote() {
                break;
            }
        }

        self.len += 1;
        self.size_bytes += key.len() + value.len();
        true
    }

    /// Number of level-0 nodes (tombstones included)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current number of levels
    pub fn level(&self) -> usize {
        self.level
    }

    /// Approximate bytes of keys and values held
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Iterate level 0 in ascending key order
    pub fn iter(&self) -> SkipListIter<'_> {
        SkipListIter {
            list: self,
            next: self.nodes[self.bottom_of(self.head)].right,
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Move right from `idx` while the next key is strictly less than `key`
    fn advance(&self, mut idx: usize, key: &[u8]) -> usize {
        while let Some(next) = self.nodes[idx].right {
            if self.nodes[next].key.as_slice() < key {
                idx = next;
            } else {
                break;
            }
        }
        idx
    }

    fn bottom_of(&self, mut idx: usize) -> usize {
        while let Some(down) = self.nodes[idx].down {
            idx = down;
        }
        idx
    }

    fn overwrite(&mut self, idx: usize, value: Vec<u8>, tombstone: bool) {
        let node = &mut self.nodes[idx];
        self.size_bytes = self.size_bytes - node.value.len() + value.len();
        node.value = value;
        node.tombstone = tombstone;
    }

    fn push(&mut self, node: SkipNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

/// Level-0 iterator yielding `(key, Some(value))` or `(key, None)` for a tombstone
pub struct SkipListIter<'a> {
    list: &'a SkipList,
    next: Option<usize>,
}

impl<'a> Iterator for SkipListIter<'a> {
    type Item = (&'a [u8], Option<&'a [u8]>);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let node = &self.list.nodes[idx];
        self.next = node.right;
        let value = if node.tombstone {
            None
        } else {
            Some(node.value.as_slice())
        };
        Some((node.key.as_slice(), value))
    }
}
