use super::FrameSink;
use crate::pipeline::types::{Frame, PixelLayout, BYTES_PER_PIXEL};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

const NOISE: i16 = 6;

/// Stand-in camera: a drifting diagonal gradient with a little sensor noise,
/// delivered as BGRA frames at a fixed rate.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    width: u32,
    height: u32,
    interval: Duration,
}

impl SyntheticCapture {
    pub fn new(width: u32, height: u32, interval: Duration) -> Self {
        Self {
            width,
            height,
            interval,
        }
    }

    pub fn generate(&self, tick: u64) -> Frame {
        let mut rng = rand::rng();
        let (r, g, b, a) = PixelLayout::Bgra.offsets();
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let mut pixels = vec![0u8; stride * self.height as usize];
        let span = (self.width + self.height).max(1) as u64;

        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                let base = ((x + y) as u64 + tick * 4) % span;
                let level = (base * 255 / span) as i16;
                let index = y * stride + x * BYTES_PER_PIXEL;
                let noisy = |offset: i16| (level + offset).clamp(0, 255) as u8;
                pixels[index + r] = noisy(rng.random_range(-NOISE..=NOISE));
                pixels[index + g] = noisy(rng.random_range(-NOISE..=NOISE));
                pixels[index + b] = noisy(rng.random_range(-NOISE..=NOISE) - 20);
                pixels[index + a] = u8::MAX;
            }
        }

        Frame::new(
            self.width,
            self.height,
            stride,
            PixelLayout::Bgra,
            pixels,
            Utc::now(),
        )
    }

    pub async fn run(self, sink: Arc<dyn FrameSink>, cancel_token: CancellationToken) {
        info!(
            "Synthetic capture started: {}x{} every {:?}",
            self.width, self.height, self.interval
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut tick = 0u64;
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    sink.on_frame(self.generate(tick));
                    tick += 1;
                }
            }
        }
        info!("Synthetic capture stopped after {} frames", tick);
    }
}
