use crate::error::{PipelineError, SettingsError};
use crate::pipeline::types::{Frame, BYTES_PER_PIXEL, HISTOGRAM_BINS};
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    task::{Context, Poll},
};
use tower::Service;
use tracing::warn;

pub const MIN_BAND_COUNT: u32 = 2;
// band size must stay at least one luminance level
pub const MAX_TRANSFORM_BAND_COUNT: u32 = 255;

/// Weighted luminance `0.30 R + 0.59 G + 0.11 B`, truncated.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u32 {
    (30 * r as u32 + 59 * g as u32 + 11 * b as u32) / 100
}

pub fn clamp_band_count(band_count: u32) -> u32 {
    let applied = band_count.clamp(MIN_BAND_COUNT, MAX_TRANSFORM_BAND_COUNT);
    if applied != band_count {
        warn!(
            "{}",
            SettingsError::OutOfRange {
                key: "bandCount",
                requested: band_count as i64,
                applied: applied as i64,
            }
        );
    }
    applied
}

/// Precomputed luminance -> band value table for one band count.
#[derive(Debug, Clone)]
pub struct BandQuantizer {
    band_count: u32,
    band_size: u32,
    table: [u8; HISTOGRAM_BINS],
}

impl BandQuantizer {
    pub fn new(band_count: u32) -> Self {
        let band_count = clamp_band_count(band_count);
        let band_size = 255 / band_count;
        let mut table = [0u8; HISTOGRAM_BINS];
        for (luma, slot) in table.iter_mut().enumerate() {
            let band = luma as u32 / band_size;
            // the top band is pinned to full white
            *slot = if band >= band_count - 1 {
                u8::MAX
            } else {
                (band * band_size) as u8
            };
        }
        Self {
            band_count,
            band_size,
            table,
        }
    }

    pub fn band_count(&self) -> u32 {
        self.band_count
    }

    pub fn band_size(&self) -> u32 {
        self.band_size
    }

    #[inline]
    pub fn quantize(&self, luma: u32) -> u8 {
        self.table[luma.min(255) as usize]
    }

    /// Posterizes `frame` into a new frame with the same dimensions, stride and layout.
    pub fn apply(&self, frame: &Frame) -> Result<Frame, PipelineError> {
        frame.validate()?;

        let (r, g, b, a) = frame.layout.offsets();
        let mut pixels = vec![0u8; frame.pixels.len()];
        let row_bytes = frame.row_bytes();

        for y in 0..frame.height as usize {
            let start = y * frame.stride;
            let src = &frame.pixels[start..start + row_bytes];
            let dst = &mut pixels[start..start + row_bytes];
            for (out, px) in dst
                .chunks_exact_mut(BYTES_PER_PIXEL)
                .zip(src.chunks_exact(BYTES_PER_PIXEL))
            {
                let value = self.quantize(luminance(px[r], px[g], px[b]));
                out[r] = value;
                out[g] = value;
                out[b] = value;
                out[a] = u8::MAX;
            }
        }

        Ok(Frame::new(
            frame.width,
            frame.height,
            frame.stride,
            frame.layout,
            pixels,
            frame.captured_at,
        ))
    }
}

/// Banding transform stage. The band count is shared so settings changes
/// take effect on the next admitted frame.
#[derive(Clone)]
pub struct BandingService {
    band_count: Arc<AtomicU32>,
}

impl BandingService {
    pub fn new(band_count: u32) -> Self {
        Self {
            band_count: Arc::new(AtomicU32::new(clamp_band_count(band_count))),
        }
    }

    pub fn band_count(&self) -> u32 {
        self.band_count.load(Ordering::Acquire)
    }

    pub fn set_band_count(&self, band_count: u32) {
        self.band_count
            .store(clamp_band_count(band_count), Ordering::Release);
    }

    pub fn apply(&self, frame: &Frame) -> Result<Frame, PipelineError> {
        BandQuantizer::new(self.band_count()).apply(frame)
    }
}

impl Service<Arc<Frame>> for BandingService {
    type Response = Frame;
    type Error = PipelineError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, frame: Arc<Frame>) -> Self::Future {
        let quantizer = BandQuantizer::new(self.band_count());
        Box::pin(async move {
            tokio::task::spawn_blocking(move || quantizer.apply(&frame))
                .await
                .map_err(|e| PipelineError::WorkerFailed(e.to_string()))?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::PixelLayout;
    use chrono::Utc;
    use tower::ServiceExt;

    #[test]
    fn luminance_uses_weighted_channels() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 255, 255), 255);
        assert_eq!(luminance(128, 128, 128), 128);
        assert_eq!(luminance(255, 0, 0), 76);
        assert_eq!(luminance(0, 255, 0), 150);
        assert_eq!(luminance(0, 0, 255), 28);
    }

    #[test]
    fn outputs_are_band_multiples_or_white_and_monotonic() {
        for band_count in 2..=50 {
            let quantizer = BandQuantizer::new(band_count);
            let band_size = quantizer.band_size();
            let mut previous = 0u8;
            for luma in 0..=255u32 {
                let value = quantizer.quantize(luma);
                assert!(
                    value == 255 || value as u32 % band_size == 0,
                    "bands={band_count} luma={luma} value={value}"
                );
                assert!(value as u32 <= (band_count - 2) * band_size || value == 255);
                assert!(value >= previous, "bands={band_count} luma={luma}");
                previous = value;
            }
            assert_eq!(quantizer.quantize(255), 255);
            assert_eq!(quantizer.quantize(0), 0);
        }
    }

    #[test]
    fn band_count_below_two_is_clamped() {
        let quantizer = BandQuantizer::new(1);
        assert_eq!(quantizer.band_count(), 2);
        assert_eq!(quantizer.quantize(126), 0);
        assert_eq!(quantizer.quantize(127), 255);
    }

    #[test]
    fn mid_gray_frame_bands_uniformly() {
        let frame = Frame::solid(640, 480, PixelLayout::Bgra, [128, 128, 128]);
        let banded = BandQuantizer::new(10).apply(&frame).unwrap();

        assert_eq!(banded.width, 640);
        assert_eq!(banded.height, 480);
        for px in banded.pixels.chunks_exact(BYTES_PER_PIXEL) {
            assert_eq!(px, &[125, 125, 125, 255]);
        }
        // input untouched
        assert_eq!(&frame.pixels[0..4], &[128, 128, 128, 255]);
    }

    #[test]
    fn padding_bytes_are_zeroed() {
        let mut pixels = vec![200u8; 12 * 2];
        pixels[3] = 0;
        let frame = Frame::new(2, 2, 12, PixelLayout::Rgba, pixels, Utc::now());
        let banded = BandQuantizer::new(4).apply(&frame).unwrap();

        assert_eq!(&banded.pixels[8..12], &[0, 0, 0, 0]);
        assert_eq!(banded.pixels[3], 255);
    }

    #[test]
    fn empty_frame_is_rejected() {
        let frame = Frame::new(0, 0, 0, PixelLayout::Bgra, vec![], Utc::now());
        assert!(matches!(
            BandQuantizer::new(10).apply(&frame),
            Err(PipelineError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn overflowing_stride_is_rejected() {
        let frame = Frame::new(
            1,
            3,
            usize::MAX / 2 + 1,
            PixelLayout::Bgra,
            vec![0; 4],
            Utc::now(),
        );
        assert!(matches!(
            BandQuantizer::new(10).apply(&frame),
            Err(PipelineError::InvalidFrame { .. })
        ));
    }

    #[tokio::test]
    async fn service_uses_current_band_count() {
        let service = BandingService::new(10);
        service.set_band_count(2);
        let frame = Arc::new(Frame::solid(8, 8, PixelLayout::Bgra, [200, 200, 200]));

        let banded = service.clone().oneshot(frame).await.unwrap();
        assert!(banded.pixels.chunks_exact(4).all(|px| px == [255, 255, 255, 255]));
        assert_eq!(service.band_count(), 2);
    }
}
