use crate::error::AppError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "BANDSCOPE";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub histogram_sample_interval_ms: u64,
    pub chart_refresh_interval_ms: u64,
    pub sample_step: u32,
    pub ui_buffer_size: usize,
    pub settings_path: Option<PathBuf>,
    pub capture_width: u32,
    pub capture_height: u32,
    pub capture_fps: u32,
    pub run_seconds: Option<u64>,
    pub snapshot_path: Option<PathBuf>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            histogram_sample_interval_ms: 100,
            chart_refresh_interval_ms: 750,
            sample_step: 4,
            ui_buffer_size: 8,
            settings_path: None,
            capture_width: 640,
            capture_height: 480,
            capture_fps: 30,
            run_seconds: None,
            snapshot_path: None,
        }
    }
}

impl Configuration {
    /// Layers an optional config file and `BANDSCOPE_*` environment variables
    /// over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let configuration: Configuration = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.histogram_sample_interval_ms == 0 || self.chart_refresh_interval_ms == 0 {
            return Err(AppError::Builder(
                "Timer intervals must be greater than 0".to_string(),
            ));
        }
        if self.sample_step == 0 {
            return Err(AppError::Builder(
                "Sample step must be greater than 0".to_string(),
            ));
        }
        if self.ui_buffer_size == 0 {
            return Err(AppError::Builder(
                "UI buffer size must be greater than 0".to_string(),
            ));
        }
        if self.capture_width == 0 || self.capture_height == 0 || self.capture_fps == 0 {
            return Err(AppError::Builder(
                "Capture dimensions and fps must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn histogram_sample_interval(&self) -> Duration {
        Duration::from_millis(self.histogram_sample_interval_ms)
    }

    pub fn chart_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.chart_refresh_interval_ms)
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.capture_fps as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_cadences() {
        let configuration = Configuration::default();
        assert_eq!(configuration.histogram_sample_interval(), Duration::from_millis(100));
        assert_eq!(configuration.chart_refresh_interval(), Duration::from_millis(750));
        assert_eq!(configuration.sample_step, 4);
        assert!(configuration.validate().is_ok());
    }

    #[test]
    fn zero_sample_step_is_rejected() {
        let configuration = Configuration {
            sample_step: 0,
            ..Configuration::default()
        };
        assert!(configuration.validate().is_err());
    }

    #[test]
    fn load_reads_values_from_file() {
        let path = std::env::temp_dir().join(format!("bandscope-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "chart_refresh_interval_ms": 500, "capture_fps": 15 }"#)
            .unwrap();
        let configuration = Configuration::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(configuration.chart_refresh_interval_ms, 500);
        assert_eq!(configuration.capture_fps, 15);
        assert_eq!(configuration.histogram_sample_interval_ms, 100);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let configuration = Configuration::load(None).unwrap();
        assert_eq!(configuration.capture_width, 640);
        assert_eq!(configuration.capture_height, 480);
    }
}
