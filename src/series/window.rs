use super::ring::SampleRing;

/// Drop samples older than `horizon_ns` relative to `now_ns`.
///
/// Two-pointer sweep from the current start: stops at the first sample
/// inside the horizon. Returns how many samples were evicted.
pub fn evict_expired(ring: &mut SampleRing, now_ns: i64, horizon_ns: i64) -> u64 {
    let before = ring.start_index();
    let mut idx = before;
    let end = ring.write_index();
    while idx < end && now_ns.saturating_sub(ring.timestamp_at(idx)) > horizon_ns {
        idx += 1;
    }
    ring.advance_start_to(idx);
    idx - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Sample;
    use proptest::prelude::*;

    const SEC: i64 = 1_000_000_000;

    fn ring_with(ts: &[i64]) -> SampleRing {
        let mut ring = SampleRing::new(ts.len().max(1));
        ring.extend(ts.iter().map(|&t| Sample { timestamp: t, value: 1 }));
        ring
    }

    #[test]
    fn drops_only_aged_out_samples() {
        let mut ring = ring_with(&[0, 10 * SEC, 30 * SEC, 65 * SEC]);
        let evicted = evict_expired(&mut ring, 71 * SEC, 60 * SEC);
        assert_eq!(evicted, 2);
        assert_eq!(ring.at(ring.start_index()).unwrap().timestamp, 30 * SEC);
    }

    #[test]
    fn age_equal_to_horizon_is_kept() {
        let mut ring = ring_with(&[0, SEC]);
        evict_expired(&mut ring, 60 * SEC, 60 * SEC);
        assert_eq!(ring.start_index(), 0);
    }

    #[test]
    fn can_empty_the_window() {
        let mut ring = ring_with(&[0, SEC, 2 * SEC]);
        evict_expired(&mut ring, 1000 * SEC, 60 * SEC);
        assert!(ring.is_empty());
        assert_eq!(ring.start_index(), ring.write_index());
    }

    proptest! {
        #[test]
        fn start_is_monotone_and_window_is_tight(
            gaps in prop::collection::vec(0i64..5 * SEC, 1..200),
            steps in prop::collection::vec(0i64..20 * SEC, 1..30),
        ) {
            let horizon = 60 * SEC;
            let mut t = 0;
            let ts: Vec<i64> = gaps.iter().map(|g| { t += g; t }).collect();
            let mut ring = ring_with(&ts);

            let mut now = 0;
            let mut last_start = ring.start_index();
            for step in steps {
                now += step;
                evict_expired(&mut ring, now, horizon);
                prop_assert!(ring.start_index() >= last_start);
                last_start = ring.start_index();

                for s in ring.iter() {
                    prop_assert!(now - s.timestamp <= horizon);
                }
                if ring.start_index() > 0 {
                    let prev = ts[(ring.start_index() - 1) as usize];
                    prop_assert!(now - prev > horizon);
                }
            }
        }
    }
}
