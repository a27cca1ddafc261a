use crate::display::DisplaySink;
use crate::pipeline::types::HistogramState;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct HistogramSlot {
    state: HistogramState,
    pending: bool,
}

/// Latest histogram plus the "new data is ready" flag, behind one lock so a
/// reader never sees a half-written state or a flag out of step with it.
#[derive(Debug, Clone, Default)]
pub struct SharedHistogram {
    slot: Arc<Mutex<HistogramSlot>>,
}

impl SharedHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, state: HistogramState) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.state = state;
        slot.pending = true;
    }

    /// Returns a copy of the state and clears the flag, if new data was pending.
    pub fn take_pending(&self) -> Option<HistogramState> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if !slot.pending {
            return None;
        }
        slot.pending = false;
        Some(slot.state.clone())
    }

    pub fn has_pending(&self) -> bool {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).pending
    }
}

/// Republishes the histogram to the display at a fixed, smooth cadence.
pub struct ChartRefreshLoop {
    histogram: SharedHistogram,
    display: Arc<dyn DisplaySink>,
    visible: Arc<AtomicBool>,
}

impl ChartRefreshLoop {
    pub fn new(histogram: SharedHistogram, display: Arc<dyn DisplaySink>) -> Self {
        Self {
            histogram,
            display,
            visible: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn visibility(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.visible)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    /// Publishes once if new data is pending. While the chart is hidden the
    /// pending data is left for the first tick after it is shown again.
    pub fn tick(&self) -> bool {
        if !self.is_visible() {
            return false;
        }
        match self.histogram.take_pending() {
            Some(state) => {
                debug!(
                    "Publishing histogram of {} samples",
                    state.total_samples()
                );
                self.display.show_histogram(state.percentages());
                true
            }
            None => false,
        }
    }

    pub async fn run(self, interval: Duration, cancel_token: CancellationToken) {
        info!("Chart refresh loop started ({:?} interval)", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }
        info!("Chart refresh loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Frame;

    #[derive(Default)]
    struct RecordingDisplay {
        histograms: Mutex<Vec<Vec<f64>>>,
    }

    impl RecordingDisplay {
        fn published(&self) -> usize {
            self.histograms.lock().unwrap().len()
        }
    }

    impl DisplaySink for RecordingDisplay {
        fn show_frame(&self, _frame: Frame) {}

        fn show_histogram(&self, percentages: Vec<f64>) {
            self.histograms.lock().unwrap().push(percentages);
        }

        fn set_chart_visible(&self, _visible: bool) {}
    }

    fn histogram_with(levels: &[u32]) -> HistogramState {
        let mut state = HistogramState::new();
        for &level in levels {
            state.record(level).unwrap();
        }
        state
    }

    #[test]
    fn tick_publishes_once_per_update() {
        let display = Arc::new(RecordingDisplay::default());
        let shared = SharedHistogram::new();
        let chart = ChartRefreshLoop::new(shared.clone(), display.clone());

        assert!(!chart.tick());
        shared.publish(histogram_with(&[7, 7, 9, 9]));

        assert!(chart.tick());
        assert!(!chart.tick());
        assert_eq!(display.published(), 1);

        let published = display.histograms.lock().unwrap()[0].clone();
        assert_eq!(published.len(), 256);
        assert_eq!(published[7], 50.0);
        assert_eq!(published[9], 50.0);
    }

    #[test]
    fn hidden_chart_keeps_pending_data() {
        let display = Arc::new(RecordingDisplay::default());
        let shared = SharedHistogram::new();
        let chart = ChartRefreshLoop::new(shared.clone(), display.clone());

        chart.set_visible(false);
        shared.publish(histogram_with(&[1]));
        assert!(!chart.tick());
        assert!(shared.has_pending());

        chart.set_visible(true);
        assert!(chart.tick());
        assert_eq!(display.published(), 1);
    }

    #[test]
    fn newer_state_replaces_unpublished_one() {
        let shared = SharedHistogram::new();
        shared.publish(histogram_with(&[1]));
        shared.publish(histogram_with(&[2, 2]));

        let state = shared.take_pending().unwrap();
        assert_eq!(state.counts()[2], 2);
        assert_eq!(state.counts()[1], 0);
        assert!(shared.take_pending().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_publishes_on_interval() {
        let display = Arc::new(RecordingDisplay::default());
        let shared = SharedHistogram::new();
        let chart = ChartRefreshLoop::new(shared.clone(), display.clone());
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(chart.run(Duration::from_millis(750), cancel_token.clone()));

        shared.publish(histogram_with(&[3]));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(display.published(), 1);

        shared.publish(histogram_with(&[4]));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(display.published(), 1);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(display.published(), 2);

        cancel_token.cancel();
        handle.await.unwrap();
    }
}
