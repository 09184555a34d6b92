// [apps/peer/src/mesh/dedup.rs]
//! Bounded insertion-ordered seen-set for gossip dedup keys. Capacity is
//! fixed at construction; once full, the oldest half is evicted in one
//! shot rather than evicting one-for-one, which keeps eviction O(1)
//! amortised instead of paying a deque-rotation cost on every insert.

use std::collections::{HashSet, VecDeque};

pub struct SeenSet {
    capacity: usize,
    order: VecDeque<String>,
    keys: HashSet<String>,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            keys: HashSet::new(),
        }
    }

    /// Returns `true` if `key` had not been seen before (and is now
    /// recorded), `false` if it was already present — the dedup layer's
    /// "drop early" check from the coordination design's gossip engine.
    pub fn check_and_insert(&mut self, key: &str) -> bool {
        if self.keys.contains(key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            let evict_count = self.capacity / 2;
            for _ in 0..evict_count {
                if let Some(oldest) = self.order.pop_front() {
                    self.keys.remove(&oldest);
                } else {
                    break;
                }
            }
        }
        self.order.push_back(key.to_string());
        self.keys.insert(key.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
