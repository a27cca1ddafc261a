use crate::error::AppError;
use crate::pipeline::types::Frame;
use std::path::Path;
use tracing::{debug, info};

/// Rendering collaborator. Only ever called from the UI task.
pub trait UiSurface: Send + 'static {
    fn render_frame(&mut self, frame: Frame);
    fn render_histogram(&mut self, percentages: &[f64]);
    fn set_chart_visible(&mut self, visible: bool);
}

/// Headless surface: keeps the latest frame and logs chart updates.
#[derive(Debug)]
pub struct LoggingSurface {
    last_frame: Option<Frame>,
    last_histogram: Vec<f64>,
    chart_visible: bool,
    frames_rendered: usize,
    histograms_rendered: usize,
}

impl Default for LoggingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingSurface {
    pub fn new() -> Self {
        Self {
            last_frame: None,
            last_histogram: Vec::new(),
            chart_visible: true,
            frames_rendered: 0,
            histograms_rendered: 0,
        }
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn last_histogram(&self) -> &[f64] {
        &self.last_histogram
    }

    pub fn chart_visible(&self) -> bool {
        self.chart_visible
    }

    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered
    }

    pub fn histograms_rendered(&self) -> usize {
        self.histograms_rendered
    }

    /// Writes the last rendered frame as an image; the format follows the extension.
    pub fn save_snapshot(&self, path: &Path) -> Result<bool, AppError> {
        match &self.last_frame {
            Some(frame) => {
                frame.to_rgba_image()?.save(path)?;
                info!("Saved snapshot to {}", path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl UiSurface for LoggingSurface {
    fn render_frame(&mut self, frame: Frame) {
        self.frames_rendered += 1;
        debug!(
            "Rendering frame {} ({}x{})",
            frame.frame_id, frame.width, frame.height
        );
        self.last_frame = Some(frame);
    }

    fn render_histogram(&mut self, percentages: &[f64]) {
        self.histograms_rendered += 1;
        let peak = percentages
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(level, pct)| (level, *pct));
        if let Some((level, pct)) = peak {
            info!("Histogram peak at luminance {} ({:.1}%)", level, pct);
        }
        self.last_histogram = percentages.to_vec();
    }

    fn set_chart_visible(&mut self, visible: bool) {
        info!("Histogram chart {}", if visible { "shown" } else { "hidden" });
        self.chart_visible = visible;
    }
}
