use chrono::{DateTime, Local, TimeZone};
use glam::Vec2;

use crate::series::query::Interpolated;

/// Tooltip offset from the pointer, in logical pixels.
pub const TOOLTIP_OFFSET: Vec2 = Vec2::new(12.0, 12.0);

/// What the overlay shows next to the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub screen_pos: Vec2,
    pub value: f64,
    pub time_label: String,
}

impl Tooltip {
    pub fn new(pointer: Vec2, hit: Interpolated) -> Self {
        Self {
            screen_pos: pointer + TOOLTIP_OFFSET,
            value: hit.value,
            time_label: format_timestamp(hit.timestamp, &Local),
        }
    }
}

/// Wall-clock time under the pointer. The right edge is `now`, the left edge
/// is `now - horizon`, linear in between. Not clamped to the plot.
pub fn pointer_target_ns(pointer_x: f32, plot_width: f32, now_ns: i64, horizon_ns: i64) -> i64 {
    let frac = if plot_width > 0.0 {
        (pointer_x / plot_width) as f64
    } else {
        1.0
    };
    let age_ns = (1.0 - frac) * horizon_ns as f64;
    now_ns - age_ns.floor() as i64
}

/// `YYYY/MM/DD hh:mm:ss.uuuuuu:nnn` with microseconds and the remaining
/// nanoseconds split out.
pub fn format_timestamp<Tz: TimeZone>(ns: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let secs = ns.div_euclid(1_000_000_000);
    let sub = ns.rem_euclid(1_000_000_000) as u32;
    let Some(utc) = DateTime::from_timestamp(secs, sub) else {
        return format!("{ns} ns");
    };
    let local = utc.with_timezone(tz);
    format!(
        "{}.{:06}:{:03}",
        local.format("%Y/%m/%d %H:%M:%S"),
        sub / 1_000,
        sub % 1_000
    )
}
