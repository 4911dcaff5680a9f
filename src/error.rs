use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartError {
    /// Read of a logical index outside `[start, end)`.
    #[error("logical index {index} outside live range [{start}, {end})")]
    OutOfRange { index: u64, start: u64, end: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("window error: {0}")]
    Window(#[from] winit::error::OsError),
}

pub type Result<T> = std::result::Result<T, ChartError>;
