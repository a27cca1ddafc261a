mod frame;
mod histogram;

pub use frame::{Frame, PixelLayout, BYTES_PER_PIXEL};
pub use histogram::{HistogramState, HISTOGRAM_BINS};
