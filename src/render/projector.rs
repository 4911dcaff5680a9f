use crate::series::ring::SampleRing;

use super::vertex::ChartVertex;

/// Autoscales the live window and projects it into NDC each frame.
///
/// The whole vertex set is rebuilt every frame; the scratch buffer is
/// reused so steady-state frames don't allocate.
pub struct FrameProjector {
    horizon_secs: f64,
    vertices: Vec<ChartVertex>,
    /// (min, max) after flat-series widening, from the last projection.
    value_range: Option<(f64, f64)>,
}

impl FrameProjector {
    pub fn new(horizon_secs: f64, capacity: usize) -> Self {
        Self {
            horizon_secs,
            vertices: Vec::with_capacity(capacity),
            value_range: None,
        }
    }

    /// Build vertices for every live sample. Empty window yields an empty slice.
    pub fn project(&mut self, ring: &SampleRing, now_ns: i64) -> &[ChartVertex] {
        self.vertices.clear();
        if ring.is_empty() {
            self.value_range = None;
            return &self.vertices;
        }

        let (mut vmin, mut vmax) = (u32::MAX, u32::MIN);
        for s in ring.iter() {
            vmin = vmin.min(s.value);
            vmax = vmax.max(s.value);
        }
        let vmin = vmin as f64;
        let mut vmax = vmax as f64;
        if vmin == vmax {
            // Flat series sits on the bottom edge instead of dividing by zero.
            vmax = vmin + 1.0;
        }
        let span = vmax - vmin;
        self.value_range = Some((vmin, vmax));

        for s in ring.iter() {
            let age = (now_ns - s.timestamp) as f64 / 1e9;
            let x = 1.0 - (age / self.horizon_secs) * 2.0;
            let y = ((s.value as f64 - vmin) / span) * 2.0 - 1.0;
            self.vertices.push(ChartVertex::new(x as f32, y as f32));
        }
        &self.vertices
    }

    pub fn vertices(&self) -> &[ChartVertex] {
        &self.vertices
    }

    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.value_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Sample;

    const SEC: i64 = 1_000_000_000;

    fn ring_of(samples: &[(i64, u32)]) -> SampleRing {
        let mut ring = SampleRing::new(64);
        ring.extend(
            samples
                .iter()
                .map(|&(timestamp, value)| Sample { timestamp, value }),
        );
        ring
    }

    #[test]
    fn empty_window_projects_nothing() {
        let mut p = FrameProjector::new(60.0, 8);
        assert!(p.project(&SampleRing::new(8), 0).is_empty());
        assert!(p.value_range().is_none());
    }

    #[test]
    fn constant_series_is_flat_at_bottom() {
        let mut p = FrameProjector::new(60.0, 8);
        let ring = ring_of(&[(0, 7), (SEC, 7), (2 * SEC, 7)]);
        let verts = p.project(&ring, 2 * SEC);
        assert_eq!(verts.len(), 3);
        for v in verts {
            assert!(!v.position[1].is_nan());
            assert_eq!(v.position[1], -1.0);
        }
        assert_eq!(p.value_range(), Some((7.0, 8.0)));
    }

    #[test]
    fn newest_right_oldest_left() {
        let mut p = FrameProjector::new(60.0, 8);
        let ring = ring_of(&[(0, 0), (30 * SEC, 50), (60 * SEC, 100)]);
        let verts = p.project(&ring, 60 * SEC).to_vec();
        assert_eq!(verts[0], ChartVertex::new(-1.0, -1.0));
        assert_eq!(verts[1], ChartVertex::new(0.0, 0.0));
        assert_eq!(verts[2], ChartVertex::new(1.0, 1.0));
    }

    #[test]
    fn full_u32_range_does_not_overflow() {
        let mut p = FrameProjector::new(60.0, 8);
        let ring = ring_of(&[(0, u32::MAX), (SEC, u32::MAX)]);
        let verts = p.project(&ring, SEC);
        assert!(verts.iter().all(|v| v.position[1] == -1.0));
    }

    #[test]
    fn reprojects_every_frame() {
        let mut p = FrameProjector::new(60.0, 8);
        let ring = ring_of(&[(0, 1), (10 * SEC, 2)]);
        let first = p.project(&ring, 10 * SEC)[1];
        let later = p.project(&ring, 40 * SEC)[1];
        assert_eq!(first.position[0], 1.0);
        assert_eq!(later.position[0], 0.0);
    }
}
