pub mod synthetic;

use crate::pipeline::types::Frame;

pub use synthetic::SyntheticCapture;

/// Receives frames pushed by a capture source. Must return quickly and must
/// not fail back into the capture path.
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, frame: Frame);
}
