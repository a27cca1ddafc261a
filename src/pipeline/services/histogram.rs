use super::banding::luminance;
use crate::error::PipelineError;
use crate::pipeline::types::{Frame, HistogramState};
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
};
use tower::Service;
use tracing::warn;

pub const DEFAULT_SAMPLE_STEP: u32 = 4;

/// Samples every `sample_step`-th row and column of a frame into a luminance histogram.
#[derive(Clone)]
pub struct HistogramService {
    sample_step: u32,
    defects: Arc<AtomicU64>,
}

impl HistogramService {
    pub fn new() -> Self {
        Self {
            sample_step: DEFAULT_SAMPLE_STEP,
            defects: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_sample_step(mut self, step: u32) -> Self {
        self.sample_step = step.max(1);
        self
    }

    pub fn sample_step(&self) -> u32 {
        self.sample_step
    }

    /// Samples whose luminance fell outside 0..=255 since creation.
    pub fn defect_count(&self) -> u64 {
        self.defects.load(Ordering::Relaxed)
    }

    pub fn accumulate(&self, frame: &Frame) -> Result<HistogramState, PipelineError> {
        let mut state = HistogramState::new();
        self.accumulate_into(frame, &mut state)?;
        Ok(state)
    }

    /// Resets `state` and fills it from `frame`.
    pub fn accumulate_into(
        &self,
        frame: &Frame,
        state: &mut HistogramState,
    ) -> Result<(), PipelineError> {
        state.reset();
        frame.validate()?;

        let step = self.sample_step as usize;
        for y in (0..frame.height).step_by(step) {
            for x in (0..frame.width).step_by(step) {
                let (r, g, b) = frame.pixel_rgb(x, y);
                if let Err(e) = state.record(luminance(r, g, b)) {
                    self.defects.fetch_add(1, Ordering::Relaxed);
                    warn!("Skipping histogram sample at ({}, {}): {}", x, y, e);
                }
            }
        }
        Ok(())
    }
}

impl Default for HistogramService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Arc<Frame>> for HistogramService {
    type Response = HistogramState;
    type Error = PipelineError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, frame: Arc<Frame>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || service.accumulate(&frame))
                .await
                .map_err(|e| PipelineError::WorkerFailed(e.to_string()))?
        })
    }
}
