use super::vertex::ChartVertex;

/// Axis cross through the origin (line list: X axis, Y axis).
pub const AXIS_VERTICES: [ChartVertex; 4] = [
    ChartVertex::new(-1.0, 0.0),
    ChartVertex::new(1.0, 0.0),
    ChartVertex::new(0.0, -1.0),
    ChartVertex::new(0.0, 1.0),
];

/// Background grid as a line list, one line every `step_secs` of age.
///
/// Vertical lines sit at the NDC x of each step; horizontal lines reuse the
/// same positions so the grid stays square. Lines at the plot edges are
/// left out. Depends only on the horizon, so it is built once at startup.
pub fn grid_vertices(horizon_secs: f64, step_secs: f64) -> Vec<ChartVertex> {
    let mut verts = Vec::new();
    let mut i = 1u64;
    loop {
        let age = i as f64 * step_secs;
        if age >= horizon_secs {
            break;
        }
        let p = (1.0 - (age / horizon_secs) * 2.0) as f32;
        verts.push(ChartVertex::new(p, -1.0));
        verts.push(ChartVertex::new(p, 1.0));
        verts.push(ChartVertex::new(-1.0, p));
        verts.push(ChartVertex::new(1.0, p));
        i += 1;
    }
    verts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_second_grid_has_five_lines_each_way() {
        let verts = grid_vertices(60.0, 10.0);
        assert_eq!(verts.len(), 5 * 4);
        // first vertical line is 10s old
        let x = verts[0].position[0];
        assert!((x - (1.0 - 2.0 / 6.0)).abs() < 1e-6);
        // 30s sits on the centre
        assert!(verts[8].position[0].abs() < 1e-6);
    }

    #[test]
    fn step_wider_than_horizon_draws_nothing() {
        assert!(grid_vertices(5.0, 10.0).is_empty());
    }

    #[test]
    fn grid_stays_inside_ndc() {
        for v in grid_vertices(60.0, 7.0) {
            assert!(v.position[0] >= -1.0 && v.position[0] <= 1.0);
            assert!(v.position[1] >= -1.0 && v.position[1] <= 1.0);
        }
    }
}
