use instant::Instant;

/// Which phase of the frame tick is being timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FramePhase {
    Ingest = 0,
    Evict = 1,
    Project = 2,
    Stage = 3,
    Render = 4,
}

const PHASE_COUNT: usize = 5;

impl FramePhase {
    pub const ALL: [FramePhase; PHASE_COUNT] = [
        Self::Ingest,
        Self::Evict,
        Self::Project,
        Self::Stage,
        Self::Render,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Ingest => "Ingest",
            Self::Evict => "Evict",
            Self::Project => "Project",
            Self::Stage => "Stage",
            Self::Render => "Render",
        }
    }
}

/// Per-phase timing with exponential moving average smoothing.
pub struct PhaseTimers {
    /// EMA-smoothed duration in microseconds per phase.
    pub durations_us: [f64; PHASE_COUNT],
    /// Timestamp when `begin()` was called.
    start: Instant,
}

const EMA_ALPHA: f64 = 0.1;

impl PhaseTimers {
    pub fn new() -> Self {
        Self {
            durations_us: [0.0; PHASE_COUNT],
            start: Instant::now(),
        }
    }

    /// Call before a phase runs.
    pub fn begin(&mut self) {
        self.start = Instant::now();
    }

    /// Call after a phase finishes. Records elapsed time for `phase`.
    pub fn end(&mut self, phase: FramePhase) {
        let elapsed_us = self.start.elapsed().as_secs_f64() * 1_000_000.0;
        self.record(phase, elapsed_us);
    }

    fn record(&mut self, phase: FramePhase, elapsed_us: f64) {
        let idx = phase as usize;
        self.durations_us[idx] =
            self.durations_us[idx] * (1.0 - EMA_ALPHA) + elapsed_us * EMA_ALPHA;
    }
}
