use std::sync::{Arc, Mutex};
use std::time::Instant;

const ALPHA: f32 = 0.1; // EWMA smoothing factor

#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub frames_admitted: u64,
    pub frames_dropped: u64,
    pub frames_invalid: u64,
    pub worker_failures: u64,
    pub histograms_sampled: u64,
    pub histogram_defects: u64,
    pub avg_transform_us: f32,
    pub avg_histogram_us: f32,
    pub max_transform_us: u64,
    pub frames_per_second: f32,
    fps_frame_count: u64,
    last_fps_calculation: Instant,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self {
            frames_admitted: 0,
            frames_dropped: 0,
            frames_invalid: 0,
            worker_failures: 0,
            histograms_sampled: 0,
            histogram_defects: 0,
            avg_transform_us: 0.0,
            avg_histogram_us: 0.0,
            max_transform_us: 0,
            frames_per_second: 0.0,
            fps_frame_count: 0,
            last_fps_calculation: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    stats: Arc<Mutex<PipelineStats>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_stats(&self) -> PipelineStats {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PipelineStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_ewma(current: f32, new_value: u64) -> f32 {
        current * (1.0 - ALPHA) + new_value as f32 * ALPHA
    }

    pub fn on_frame_admitted(&self) {
        let mut stats = self.lock();
        stats.frames_admitted += 1;

        stats.fps_frame_count += 1;
        let now = Instant::now();
        let elapsed = now.duration_since(stats.last_fps_calculation);
        if elapsed.as_secs_f32() >= 1.0 {
            stats.frames_per_second = stats.fps_frame_count as f32 / elapsed.as_secs_f32();
            stats.fps_frame_count = 0;
            stats.last_fps_calculation = now;
        }
    }

    pub fn on_frame_dropped(&self) {
        self.lock().frames_dropped += 1;
    }

    pub fn on_frame_invalid(&self) {
        self.lock().frames_invalid += 1;
    }

    pub fn on_worker_failure(&self) {
        self.lock().worker_failures += 1;
    }

    pub fn on_transform(&self, duration_us: u64) {
        let mut stats = self.lock();
        stats.avg_transform_us = Self::update_ewma(stats.avg_transform_us, duration_us);
        stats.max_transform_us = stats.max_transform_us.max(duration_us);
    }

    pub fn on_histogram(&self, duration_us: u64, defects: u64) {
        let mut stats = self.lock();
        stats.histograms_sampled += 1;
        stats.histogram_defects = defects;
        stats.avg_histogram_us = Self::update_ewma(stats.avg_histogram_us, duration_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = PipelineMetrics::new();
        metrics.on_frame_admitted();
        metrics.on_frame_dropped();
        metrics.on_frame_dropped();
        metrics.on_frame_invalid();

        let stats = metrics.get_stats();
        assert_eq!(stats.frames_admitted, 1);
        assert_eq!(stats.frames_dropped, 2);
        assert_eq!(stats.frames_invalid, 1);
    }

    #[test]
    fn transform_timing_is_smoothed() {
        let metrics = PipelineMetrics::new();
        metrics.on_transform(1000);
        metrics.on_transform(1000);

        let stats = metrics.get_stats();
        assert!((stats.avg_transform_us - 190.0).abs() < 0.01);
        assert_eq!(stats.max_transform_us, 1000);
    }
}
