//! Half-open interval set over stream offsets.
//!
//! Tracks which send-side byte ranges are frame headers rather than body,
//! so acknowledgment and retransmission callbacks can split a byte range
//! into its body and framing shares.

use std::collections::BTreeMap;
use std::ops::Range;

/// Set of disjoint half-open `[start, end)` intervals, keyed by start.
/// Adjacent and overlapping inserts are merged.
#[derive(Debug, Default, Clone)]
pub struct IntervalSet {
    intervals: BTreeMap<u64, u64>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Insert `range`, merging with any overlapping or adjacent intervals.
    pub fn insert(&mut self, range: Range<u64>) {
        if range.start >= range.end {
            return;
        }
        let mut start = range.start;
        let mut end = range.end;

        // Merge with a preceding interval that touches or overlaps.
        if let Some((&s, &e)) = self.intervals.range(..=start).next_back() {
            if e >= start {
                start = s;
                end = end.max(e);
                self.intervals.remove(&s);
            }
        }
        // Absorb following intervals that start inside the merged range.
        let overlapping: Vec<u64> = self
            .intervals
            .range(start..=end)
            .map(|(&s, _)| s)
            .collect();
        for s in overlapping {
            if let Some(e) = self.intervals.remove(&s) {
                end = end.max(e);
            }
        }
        self.intervals.insert(start, end);
    }

    /// Remove `range`, splitting intervals that straddle its boundaries.
    pub fn remove(&mut self, range: Range<u64>) {
        if range.start >= range.end {
            return;
        }
        let affected: Vec<(u64, u64)> = self
            .intervals
            .range(..range.end)
            .filter(|&(_, &e)| e > range.start)
            .map(|(&s, &e)| (s, e))
            .collect();
        for (s, e) in affected {
            self.intervals.remove(&s);
            if s < range.start {
                self.intervals.insert(s, range.start);
            }
            if e > range.end {
                self.intervals.insert(range.end, e);
            }
        }
    }

    /// Total number of bytes in the intersection of the set with `range`.
    pub fn intersection_len(&self, range: Range<u64>) -> u64 {
        if range.start >= range.end {
            return 0;
        }
        self.intervals
            .range(..range.end)
            .filter(|&(_, &e)| e > range.start)
            .map(|(&s, &e)| e.min(range.end) - s.max(range.start))
            .sum()
    }

    /// Number of stored intervals fully contained in `range`.
    pub fn count_contained(&self, range: Range<u64>) -> usize {
        self.intervals
            .range(range.start..range.end)
            .filter(|&(_, &e)| e <= range.end)
            .count()
    }
}
