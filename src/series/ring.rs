use std::ops::Range;

use crate::error::{ChartError, Result};

use super::Sample;

/// Fixed-capacity sample store addressed by logical index.
///
/// Logical indices count every sample ever appended and never wrap; the
/// physical slot is `logical % capacity`. Only `[start, write)` is readable.
/// Storage is pre-allocated as two parallel arrays, no heap allocs after init.
pub struct SampleRing {
    timestamps: Vec<i64>,
    values: Vec<u32>,
    capacity: usize,
    /// Samples ever appended.
    write: u64,
    /// Samples evicted or overwritten.
    start: u64,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            timestamps: vec![0; capacity],
            values: vec![0; capacity],
            capacity,
            write: 0,
            start: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn physical(&self, logical: u64) -> usize {
        (logical % self.capacity as u64) as usize
    }

    /// O(1). Overwrites the oldest sample when full.
    pub fn append(&mut self, sample: Sample) {
        let slot = self.physical(self.write);
        self.timestamps[slot] = sample.timestamp;
        self.values[slot] = sample.value;
        self.write += 1;
        if self.write - self.start > self.capacity as u64 {
            self.start += 1;
        }
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = Sample>) {
        for s in samples {
            self.append(s);
        }
    }

    /// Live logical range `[start, write)`.
    pub fn logical_range(&self) -> Range<u64> {
        self.start..self.write
    }

    pub fn start_index(&self) -> u64 {
        self.start
    }

    pub fn write_index(&self) -> u64 {
        self.write
    }

    pub fn len(&self) -> usize {
        (self.write - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.write == self.start
    }

    /// Read a live sample. Indices that were evicted, or not written yet, fail.
    pub fn at(&self, logical: u64) -> Result<Sample> {
        if !self.logical_range().contains(&logical) {
            return Err(ChartError::OutOfRange {
                index: logical,
                start: self.start,
                end: self.write,
            });
        }
        Ok(self.get_unchecked(logical))
    }

    /// Caller guarantees `logical` is inside `logical_range()`.
    pub(crate) fn get_unchecked(&self, logical: u64) -> Sample {
        debug_assert!(self.logical_range().contains(&logical));
        let slot = self.physical(logical);
        Sample {
            timestamp: self.timestamps[slot],
            value: self.values[slot],
        }
    }

    pub(crate) fn timestamp_at(&self, logical: u64) -> i64 {
        debug_assert!(self.logical_range().contains(&logical));
        self.timestamps[self.physical(logical)]
    }

    /// Move the start forward. Never retreats and never passes `write`.
    pub(crate) fn advance_start_to(&mut self, logical: u64) {
        self.start = self.start.max(logical.min(self.write));
    }

    /// Iterate live samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.logical_range().map(move |i| self.get_unchecked(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn s(timestamp: i64, value: u32) -> Sample {
        Sample { timestamp, value }
    }

    #[test]
    fn append_within_capacity() {
        let mut ring = SampleRing::new(4);
        ring.append(s(1, 10));
        ring.append(s(2, 20));
        assert_eq!(ring.logical_range(), 0..2);
        assert_eq!(ring.at(0).unwrap(), s(1, 10));
        assert_eq!(ring.at(1).unwrap(), s(2, 20));
        assert!(ring.at(2).is_err());
    }

    #[test]
    fn overflow_evicts_oldest() {
        let cap = 5;
        let mut ring = SampleRing::new(cap);
        for i in 0..=cap as i64 {
            ring.append(s(i * 100, i as u32));
        }
        let start = ring.start_index();
        assert_eq!(start, 1);
        assert_eq!(ring.len(), cap);

        let err = ring.at(start - 1).unwrap_err();
        assert!(matches!(
            err,
            ChartError::OutOfRange { index: 0, start: 1, end: 6 }
        ));
        // second sample appended
        assert_eq!(ring.at(start).unwrap(), s(100, 1));
    }

    #[test]
    fn start_never_passes_write() {
        let mut ring = SampleRing::new(3);
        ring.append(s(0, 0));
        ring.advance_start_to(10);
        assert_eq!(ring.start_index(), 1);
        assert!(ring.is_empty());
        ring.advance_start_to(0);
        assert_eq!(ring.start_index(), 1);
    }

    #[test]
    fn iter_is_oldest_first_after_wrap() {
        let mut ring = SampleRing::new(3);
        ring.extend((0..7).map(|i| s(i, i as u32)));
        let ts: Vec<i64> = ring.iter().map(|x| x.timestamp).collect();
        assert_eq!(ts, vec![4, 5, 6]);
    }

    proptest! {
        #[test]
        fn keeps_most_recent_capacity(cap in 1usize..64, n in 0usize..300) {
            let mut ring = SampleRing::new(cap);
            ring.extend((0..n).map(|i| s(i as i64, i as u32)));

            let expected = n.min(cap);
            prop_assert_eq!(ring.len(), expected);
            prop_assert!(ring.start_index() <= ring.write_index());
            if n > cap {
                prop_assert_eq!(ring.write_index() - ring.start_index(), cap as u64);
            }
            let kept: Vec<u32> = ring.iter().map(|x| x.value).collect();
            let want: Vec<u32> = ((n - expected)..n).map(|i| i as u32).collect();
            prop_assert_eq!(kept, want);
        }
    }
}
