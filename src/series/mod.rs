pub mod query;
pub mod ring;
pub mod window;

/// One telemetry reading. Timestamp is wall-clock nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    pub timestamp: i64,
    pub value: u32,
}
