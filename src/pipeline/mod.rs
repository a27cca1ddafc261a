pub mod orchestrator;
pub mod services;
pub mod types;

pub use orchestrator::{PipelineOrchestrator, ProcessOutcome};
pub use services::{
    BandingService, ChartRefreshLoop, FrameScheduler, HistogramService, SamplingGate,
    SharedHistogram,
};
pub use types::{Frame, HistogramState, PixelLayout};
