use crate::error::PipelineError;

pub const HISTOGRAM_BINS: usize = 256;

/// Luminance distribution of the most recently sampled frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramState {
    counts: [u32; HISTOGRAM_BINS],
    total_samples: u32,
}

impl Default for HistogramState {
    fn default() -> Self {
        Self::new()
    }
}

impl HistogramState {
    pub fn new() -> Self {
        Self {
            counts: [0; HISTOGRAM_BINS],
            total_samples: 0,
        }
    }

    pub fn reset(&mut self) {
        self.counts = [0; HISTOGRAM_BINS];
        self.total_samples = 0;
    }

    /// Counts one sample. Out-of-range luminance is still counted as a taken
    /// sample but lands in no bucket.
    pub fn record(&mut self, luma: u32) -> Result<(), PipelineError> {
        self.total_samples += 1;
        match self.counts.get_mut(luma as usize) {
            Some(bucket) => {
                *bucket += 1;
                Ok(())
            }
            None => Err(PipelineError::HistogramBucketOutOfRange(luma)),
        }
    }

    pub fn counts(&self) -> &[u32; HISTOGRAM_BINS] {
        &self.counts
    }

    pub fn total_samples(&self) -> u32 {
        self.total_samples
    }

    pub fn sum(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    /// `count / total_samples * 100` per bucket, all zeros when nothing was sampled.
    pub fn percentages(&self) -> Vec<f64> {
        if self.total_samples == 0 {
            return vec![0.0; HISTOGRAM_BINS];
        }
        let total = self.total_samples as f64;
        self.counts
            .iter()
            .map(|&count| count as f64 / total * 100.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_zero_percentages() {
        let state = HistogramState::new();
        let percentages = state.percentages();
        assert_eq!(percentages.len(), HISTOGRAM_BINS);
        assert!(percentages.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn out_of_range_sample_is_reported_and_not_bucketed() {
        let mut state = HistogramState::new();
        state.record(10).unwrap();
        let result = state.record(300);

        assert_eq!(result, Err(PipelineError::HistogramBucketOutOfRange(300)));
        assert_eq!(state.counts()[255], 0);
        assert_eq!(state.sum(), 1);
        assert_eq!(state.total_samples(), 2);
    }

    #[test]
    fn percentages_are_relative_to_samples() {
        let mut state = HistogramState::new();
        for _ in 0..3 {
            state.record(0).unwrap();
        }
        state.record(255).unwrap();

        let percentages = state.percentages();
        assert_eq!(percentages[0], 75.0);
        assert_eq!(percentages[255], 25.0);
    }

    #[test]
    fn reset_clears_counts() {
        let mut state = HistogramState::new();
        state.record(42).unwrap();
        state.reset();
        assert_eq!(state, HistogramState::new());
    }
}
