use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Pipeline Error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("Settings Error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to build: {0}")]
    Builder(String),
}

// Per-frame processing errors. None of these abort the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Invalid frame {width}x{height} (stride {stride}, {len} bytes): {reason}")]
    InvalidFrame {
        width: u32,
        height: u32,
        stride: usize,
        len: usize,
        reason: &'static str,
    },
    #[error("Histogram bucket {0} is outside 0..=255")]
    HistogramBucketOutOfRange(u32),
    #[error("Frame worker failed: {0}")]
    WorkerFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Setting {key} requested {requested}, clamped to {applied}")]
    OutOfRange {
        key: &'static str,
        requested: i64,
        applied: i64,
    },
    #[error("Settings storage unavailable: {0}")]
    PersistenceUnavailable(String),
}
