use crate::series::Sample;

/// Bytes per binary record: i64 LE timestamp (ns) + u32 LE value.
pub const RECORD_WIDTH: usize = 12;

/// Decode packed records in order. A trailing partial record is dropped.
pub fn decode_records(blob: &[u8]) -> Vec<Sample> {
    blob.chunks_exact(RECORD_WIDTH)
        .filter_map(|rec| {
            let (ts, rest) = rec.split_first_chunk::<8>()?;
            let (val, _) = rest.split_first_chunk::<4>()?;
            Some(Sample {
                timestamp: i64::from_le_bytes(*ts),
                value: u32::from_le_bytes(*val),
            })
        })
        .collect()
}

/// Inverse of [`decode_records`], used by tests and local tooling.
#[cfg(test)]
pub fn encode_records(samples: &[Sample]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(samples.len() * RECORD_WIDTH);
    for s in samples {
        buf.extend_from_slice(&s.timestamp.to_le_bytes());
        buf.extend_from_slice(&s.value.to_le_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_little_endian_fields() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&(-5i64).to_le_bytes());
        blob.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        let out = decode_records(&blob);
        assert_eq!(
            out,
            vec![Sample {
                timestamp: -5,
                value: 0xDEAD_BEEF
            }]
        );
    }

    #[test]
    fn decodes_extreme_fields() {
        let samples = [
            Sample { timestamp: i64::MIN, value: u32::MAX },
            Sample { timestamp: i64::MAX, value: 1 },
        ];
        let out = decode_records(&encode_records(&samples));
        assert_eq!(out, samples);
    }

    #[test]
    fn empty_and_short_blobs_yield_nothing() {
        assert!(decode_records(&[]).is_empty());
        assert!(decode_records(&[1u8; 11]).is_empty());
    }

    proptest! {
        #[test]
        fn trailing_partial_record_is_dropped(k in 0usize..40, r in 0usize..RECORD_WIDTH) {
            let samples: Vec<Sample> = (0..k)
                .map(|i| Sample { timestamp: i as i64 * 1_000, value: i as u32 })
                .collect();
            let mut blob = encode_records(&samples);
            blob.extend(std::iter::repeat(0xAB).take(r));
            prop_assert_eq!(blob.len(), RECORD_WIDTH * k + r);

            let out = decode_records(&blob);
            prop_assert_eq!(out, samples);
        }
    }
}
