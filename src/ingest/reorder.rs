use std::collections::BTreeMap;

use crate::series::Sample;

use super::pool::DecodedBatch;

/// Releases decoded batches strictly in dispatch order.
///
/// Holds out-of-order batches until the gap before them fills.
#[derive(Default)]
pub struct ReorderBuffer {
    next: u64,
    pending: BTreeMap<u64, Vec<Sample>>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, batch: DecodedBatch) {
        if batch.seq < self.next {
            log::warn!("Duplicate decode batch #{} ignored", batch.seq);
            return;
        }
        self.pending.insert(batch.seq, batch.samples);
    }

    /// Next in-order batch, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<Vec<Sample>> {
        let samples = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(samples)
    }

    /// Batches parked behind a missing sequence number.
    pub fn parked(&self) -> usize {
        self.pending.len()
    }
}
