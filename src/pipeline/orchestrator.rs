use crate::capture::FrameSink;
use crate::display::DisplaySink;
use crate::error::PipelineError;
use crate::pipeline::services::{
    AdmissionPermit, BandingService, FrameScheduler, HistogramService, PipelineMetrics,
    PipelineStats, SamplingGate, SharedHistogram,
};
use crate::pipeline::types::{Frame, HistogramState};
use crate::settings::{SettingsEvent, SettingsStore};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;
use tokio::runtime::Handle;
use tower::ServiceExt;
use tracing::{debug, error, warn};

/// What one admitted frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub display_published: bool,
    pub histogram_updated: bool,
}

/// Receives captured frames, applies backpressure, and fans each admitted
/// frame out to the banding transform and the histogram accumulator.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    scheduler: FrameScheduler,
    sampling_gate: SamplingGate,
    banding: BandingService,
    histogram: HistogramService,
    shared_histogram: SharedHistogram,
    display: Arc<dyn DisplaySink>,
    metrics: PipelineMetrics,
    runtime: Handle,
}

impl PipelineOrchestrator {
    /// Must be called from within a tokio runtime; frame work is spawned onto it.
    pub fn new(
        band_count: u32,
        histogram: HistogramService,
        shared_histogram: SharedHistogram,
        sampling_gate: SamplingGate,
        display: Arc<dyn DisplaySink>,
    ) -> Self {
        Self {
            scheduler: FrameScheduler::new(),
            sampling_gate,
            banding: BandingService::new(band_count),
            histogram,
            shared_histogram,
            display,
            metrics: PipelineMetrics::new(),
            runtime: Handle::current(),
        }
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn band_count(&self) -> u32 {
        self.banding.band_count()
    }

    pub fn stats(&self) -> PipelineStats {
        self.metrics.get_stats()
    }

    /// Writes the band count through the store and applies the stored value.
    pub fn set_band_count(&self, settings: &SettingsStore, requested: i64) -> u32 {
        let applied = settings.set_band_count(requested);
        self.banding.set_band_count(applied);
        applied
    }

    /// Applies the current settings and keeps following them.
    pub fn attach_settings(&self, settings: &SettingsStore, chart_visible: Arc<AtomicBool>) {
        let values = settings.values();
        self.banding.set_band_count(values.band_count);
        chart_visible.store(values.histogram_visible, Ordering::Release);
        self.display.set_chart_visible(values.histogram_visible);

        let banding = self.banding.clone();
        let display = Arc::clone(&self.display);
        let store = settings.clone();
        settings.subscribe(move |event| match event {
            SettingsEvent::MaxBandsChanged => {
                let band_count = store.band_count();
                debug!("Max bands changed, band count is now {}", band_count);
                banding.set_band_count(band_count);
            }
            SettingsEvent::HistogramVisibilityChanged => {
                let visible = store.histogram_visible();
                chart_visible.store(visible, Ordering::Release);
                display.set_chart_visible(visible);
            }
        });
    }

    /// Admits `frame` if nothing is in flight; returns the permit or drops the frame.
    fn admit(&self, frame: &Frame) -> Option<AdmissionPermit> {
        match self.scheduler.try_admit() {
            Some(permit) => {
                self.metrics.on_frame_admitted();
                Some(permit)
            }
            None => {
                self.metrics.on_frame_dropped();
                debug!("Dropping frame {}: previous frame still processing", frame.frame_id);
                None
            }
        }
    }

    /// Runs one admitted frame to completion. The permit is released when
    /// both the transform and the histogram update are done or skipped.
    async fn run_cycle(
        &self,
        frame: Frame,
        _permit: AdmissionPermit,
    ) -> Result<ProcessOutcome, PipelineError> {
        if let Err(e) = frame.validate() {
            self.metrics.on_frame_invalid();
            return Err(e);
        }

        let frame = Arc::new(frame);
        let sample_histogram = self.sampling_gate.take_due();

        let transform = {
            let banding = self.banding.clone();
            let frame = Arc::clone(&frame);
            async move {
                let start = Instant::now();
                let result = banding.oneshot(frame).await;
                (result, start.elapsed().as_micros() as u64)
            }
        };
        let histogram = {
            let service = self.histogram.clone();
            let frame = Arc::clone(&frame);
            async move {
                if !sample_histogram {
                    return None;
                }
                let start = Instant::now();
                let result = service.oneshot(frame).await;
                Some((result, start.elapsed().as_micros() as u64))
            }
        };

        let ((banded, transform_us), histogram) = tokio::join!(transform, histogram);
        drop(frame);

        let display_published = match banded {
            Ok(banded) => {
                self.metrics.on_transform(transform_us);
                self.display.show_frame(banded);
                true
            }
            Err(e) => {
                self.record_failure(&e);
                false
            }
        };

        let histogram_updated = match histogram {
            Some((Ok(state), histogram_us)) => {
                self.publish_histogram(state, histogram_us);
                true
            }
            Some((Err(e), _)) => {
                // let the next admitted frame try again
                self.sampling_gate.mark_due();
                self.record_failure(&e);
                false
            }
            None => false,
        };

        Ok(ProcessOutcome {
            display_published,
            histogram_updated,
        })
    }

    fn publish_histogram(&self, state: HistogramState, duration_us: u64) {
        self.metrics
            .on_histogram(duration_us, self.histogram.defect_count());
        self.shared_histogram.publish(state);
    }

    fn record_failure(&self, e: &PipelineError) {
        match e {
            PipelineError::WorkerFailed(_) => {
                self.metrics.on_worker_failure();
                error!("Skipping frame: {}", e);
            }
            _ => warn!("Skipping frame: {}", e),
        }
    }

    /// Processes `frame` on the caller's task. Returns `Ok(None)` when the
    /// frame was dropped because another one is in flight.
    pub async fn process_frame(
        &self,
        frame: Frame,
    ) -> Result<Option<ProcessOutcome>, PipelineError> {
        match self.admit(&frame) {
            Some(permit) => self.run_cycle(frame, permit).await.map(Some),
            None => Ok(None),
        }
    }
}

impl FrameSink for PipelineOrchestrator {
    fn on_frame(&self, frame: Frame) {
        let Some(permit) = self.admit(&frame) else {
            return;
        };
        let orchestrator = self.clone();
        self.runtime.spawn(async move {
            if let Err(e) = orchestrator.run_cycle(frame, permit).await {
                warn!("Skipping frame: {}", e);
            }
        });
    }
}
