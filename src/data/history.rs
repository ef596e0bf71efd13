//! Rolling telemetry history for trend charts.
//!
//! A capacity-capped FIFO: entries are appended at the tail and, once the
//! buffer grows past capacity, the oldest entry is evicted from the head. The
//! decision logic never reads it.

use serde::Serialize;
use std::collections::VecDeque;

/// Default number of entries kept for display.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Default alarm line drawn across the temperature chart, in °C.
pub const DEFAULT_DISPLAY_THRESHOLD: f64 = 85.0;

/// One charted point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Monotonic tick index.
    pub sequence_index: u64,
    /// Reading temperature, °C.
    pub temperature: f64,
    /// Bubbles in that reading.
    pub bubble_count: u32,
    /// Fixed display constant, not derived from data.
    pub threshold: f64,
}

impl HistoryEntry {
    /// Build one point.
    pub fn new(sequence_index: u64, temperature: f64, bubble_count: u32, threshold: f64) -> Self {
        Self {
            sequence_index,
            temperature,
            bubble_count,
            threshold,
        }
    }
}

/// Bounded FIFO of recent points for charting.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    display_threshold: f64,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_DISPLAY_THRESHOLD)
    }
}

impl HistoryBuffer {
    /// Create an empty buffer. A zero capacity is treated as 1.
    pub fn new(capacity: usize, display_threshold: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            display_threshold,
        }
    }

    /// Push to the tail, evicting from the head past capacity.
    pub fn append(&mut self, entry: HistoryEntry) {
        debug_assert!(
            self.entries
                .back()
                .map_or(true, |last| last.sequence_index < entry.sequence_index),
            "history sequence_index must be strictly increasing"
        );

        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Ordered copy of the buffer, oldest first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Most recent point, if any.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Number of points held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no point has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of points kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Threshold line stamped on every point.
    pub fn display_threshold(&self) -> f64 {
        self.display_threshold
    }
}
