use super::ring::SampleRing;

/// Result of a point-in-time lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolated {
    pub value: f64,
    /// Interpolated timestamp in nanoseconds.
    pub timestamp: i64,
}

/// Value at `target_ns`, linearly interpolated between the bracketing pair.
///
/// Timestamps are assumed non-decreasing with logical index; the ring does
/// not enforce it. Targets beyond the first or last sample extrapolate along
/// the edge pair instead of clamping. Returns `None` on an empty window.
pub fn value_at(ring: &SampleRing, target_ns: i64) -> Option<Interpolated> {
    if ring.is_empty() {
        return None;
    }
    let range = ring.logical_range();

    // Lower bound over [start, write - 1]: first index with ts >= target,
    // or the last index if every sample is older.
    let (mut lo, mut hi) = (range.start, range.end - 1);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if ring.timestamp_at(mid) < target_ns {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    let i1 = lo;
    let i0 = i1.saturating_sub(1).max(range.start);

    let a = ring.get_unchecked(i0);
    let b = ring.get_unchecked(i1);
    let span = b.timestamp - a.timestamp;
    let frac = if span == 0 {
        0.0
    } else {
        (target_ns - a.timestamp) as f64 / span as f64
    };

    let value = a.value as f64 + (b.value as f64 - a.value as f64) * frac;
    let timestamp = a.timestamp + (frac * span as f64).floor() as i64;
    Some(Interpolated { value, timestamp })
}
