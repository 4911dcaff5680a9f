use clap::{Parser, ValueEnum};

use crate::error::{ChartError, Result};

/// Upper bound on grid lines per axis (`horizon / grid step`).
pub const MAX_GRID_LINES: f64 = 1000.0;

/// How decoded batches are ordered before they reach the ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DecodeOrder {
    /// Append in worker completion order. Cross-blob jitter is possible.
    BestEffort,
    /// Tag each blob and release batches in dispatch order.
    Strict,
}

/// Runtime options for the chart.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Websocket feed delivering JSON envelopes or 12-byte binary records.
    #[arg(long, default_value = "ws://127.0.0.1:3032/signal")]
    pub url: String,

    /// Ring buffer capacity in samples (also the max vertex count).
    #[arg(long, default_value_t = 64_000 * 60)]
    pub capacity: usize,

    /// Visible history in seconds.
    #[arg(long, default_value_t = 60.0)]
    pub horizon_secs: f64,

    /// Decode worker threads.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Staging buffers rotated between CPU writes and GPU copies.
    #[arg(long, default_value_t = 3)]
    pub frames_in_flight: usize,

    #[arg(long, value_enum, default_value_t = DecodeOrder::BestEffort)]
    pub ordering: DecodeOrder,

    /// Spacing of background grid lines in seconds.
    #[arg(long, default_value_t = 10.0)]
    pub grid_step_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3032/signal".into(),
            capacity: 64_000 * 60,
            horizon_secs: 60.0,
            workers: 4,
            frames_in_flight: 3,
            ordering: DecodeOrder::BestEffort,
            grid_step_secs: 10.0,
        }
    }
}

impl Config {
    /// Reject values the pipeline can't run with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ChartError::Config("capacity must be at least 1".into()));
        }
        if !(self.horizon_secs.is_finite() && self.horizon_secs > 0.0) {
            return Err(ChartError::Config(format!(
                "horizon must be a positive number of seconds, got {}",
                self.horizon_secs
            )));
        }
        if self.workers == 0 {
            return Err(ChartError::Config("need at least one decode worker".into()));
        }
        if self.frames_in_flight < 2 {
            return Err(ChartError::Config(format!(
                "frames in flight must be >= 2, got {}",
                self.frames_in_flight
            )));
        }
        if !(self.grid_step_secs.is_finite() && self.grid_step_secs > 0.0) {
            return Err(ChartError::Config(format!(
                "grid step must be positive, got {}",
                self.grid_step_secs
            )));
        }
        if self.horizon_secs / self.grid_step_secs > MAX_GRID_LINES {
            return Err(ChartError::Config(format!(
                "grid step {}s draws more than {MAX_GRID_LINES} lines over a {}s horizon",
                self.grid_step_secs, self.horizon_secs
            )));
        }
        Ok(())
    }

    /// Horizon in nanoseconds, the unit sample timestamps use.
    pub fn horizon_ns(&self) -> i64 {
        (self.horizon_secs * 1e9) as i64
    }
}
