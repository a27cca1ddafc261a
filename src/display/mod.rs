pub mod surface;
pub mod ui_adapter;

use crate::pipeline::types::Frame;

pub use surface::{LoggingSurface, UiSurface};
pub use ui_adapter::{run_ui_loop, UiHandle, UiReceiver, UiUpdate};

/// Where the core publishes results. Implementations must not block: the
/// caller may be a frame worker or a timer task.
pub trait DisplaySink: Send + Sync {
    fn show_frame(&self, frame: Frame);
    fn show_histogram(&self, percentages: Vec<f64>);
    fn set_chart_visible(&self, visible: bool);
}
