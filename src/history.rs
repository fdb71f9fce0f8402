//! Bounded-retention ring buffers.
//!
//! The store keeps every table (history samples, audit log, decisions) in
//! a [`RetentionRing`]: append-only, capped at a fixed count, oldest
//! entry evicted first.  Reads return the newest entries first.

use std::collections::VecDeque;

use crate::app::events::HistorySample;

/// Append-only ring trimmed to `capacity` entries.
#[derive(Debug, Clone)]
pub struct RetentionRing<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

/// Label timeline, 28 800 samples by default (24 h at 3 s).
pub type HistoryRing = RetentionRing<HistorySample>;

impl<T> RetentionRing<T> {
    /// `capacity` of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            // Large caps grow on demand rather than up front.
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append `entry`, returning the evicted oldest entry if the ring was full.
    pub fn push(&mut self, entry: T) -> Option<T> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Newest first, at most `limit` entries.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &T> {
        self.entries.iter().rev().take(limit)
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
