pub mod banding;
pub mod chart_refresh;
pub mod histogram;
pub mod metrics;
pub mod scheduler;

pub use banding::{luminance, BandQuantizer, BandingService};
pub use chart_refresh::{ChartRefreshLoop, SharedHistogram};
pub use histogram::HistogramService;
pub use metrics::{PipelineMetrics, PipelineStats};
pub use scheduler::{
    spawn_sampling_timer, AdmissionPermit, FrameScheduler, SamplingGate, SchedulerState,
};
