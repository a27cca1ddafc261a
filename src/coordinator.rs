use crate::{
    capture::{FrameSink, SyntheticCapture},
    config::Configuration,
    display::{run_ui_loop, DisplaySink, LoggingSurface, UiHandle, UiSurface},
    error::AppError,
    pipeline::{
        services::spawn_sampling_timer, ChartRefreshLoop, HistogramService, PipelineOrchestrator,
        SamplingGate, SharedHistogram,
    },
    settings::{self, MemoryMedium, SettingsStore},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns every long-running task of the pipeline and shuts them down together.
pub struct Coordinator<S: UiSurface> {
    orchestrator: PipelineOrchestrator,
    settings: SettingsStore,
    cancel_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    ui_task: Option<JoinHandle<S>>,
}

impl<S: UiSurface> Coordinator<S> {
    fn start(configuration: Configuration, surface: S, capture: bool) -> Self {
        let cancel_token = CancellationToken::new();

        let medium = settings::open_medium(configuration.settings_path.as_deref())
            .unwrap_or_else(|e| {
                warn!("Falling back to in-memory settings: {}", e);
                Box::new(MemoryMedium::new())
            });
        let (settings, dispatcher) = SettingsStore::new(medium);

        let (ui_handle, ui_receiver) = UiHandle::new(configuration.ui_buffer_size);
        let display: Arc<dyn DisplaySink> = Arc::new(ui_handle);

        let shared_histogram = SharedHistogram::new();
        let sampling_gate = SamplingGate::new();
        let chart = ChartRefreshLoop::new(shared_histogram.clone(), Arc::clone(&display));

        let orchestrator = PipelineOrchestrator::new(
            settings.band_count(),
            HistogramService::new().with_sample_step(configuration.sample_step),
            shared_histogram,
            sampling_gate.clone(),
            display,
        );
        orchestrator.attach_settings(&settings, chart.visibility());

        let ui_task = tokio::spawn(run_ui_loop(ui_receiver, surface, cancel_token.clone()));
        let mut tasks = vec![
            tokio::spawn(dispatcher.run(cancel_token.clone())),
            spawn_sampling_timer(
                sampling_gate,
                configuration.histogram_sample_interval(),
                cancel_token.clone(),
            ),
            tokio::spawn(chart.run(
                configuration.chart_refresh_interval(),
                cancel_token.clone(),
            )),
        ];

        if capture {
            let source = SyntheticCapture::new(
                configuration.capture_width,
                configuration.capture_height,
                configuration.capture_interval(),
            );
            let sink: Arc<dyn FrameSink> = Arc::new(orchestrator.clone());
            tasks.push(tokio::spawn(source.run(sink, cancel_token.clone())));
        }

        info!("Coordinator started {} tasks", tasks.len() + 1);
        Self {
            orchestrator,
            settings,
            cancel_token,
            tasks,
            ui_task: Some(ui_task),
        }
    }

    pub fn orchestrator(&self) -> &PipelineOrchestrator {
        &self.orchestrator
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Stops all tasks, waits for them, and hands back the UI surface.
    pub async fn wait(mut self) -> Result<S, AppError> {
        self.stop();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Task ended abnormally: {}", e);
            }
        }
        let ui_task = self
            .ui_task
            .take()
            .ok_or_else(|| AppError::Builder("UI task already joined".to_string()))?;
        let surface = ui_task
            .await
            .map_err(|e| AppError::Builder(format!("UI task failed: {}", e)))?;
        let stats = self.orchestrator.stats();
        info!(
            "Coordinator stopped: {} frames admitted, {} dropped, {} invalid",
            stats.frames_admitted, stats.frames_dropped, stats.frames_invalid
        );
        Ok(surface)
    }
}

impl<S: UiSurface> Drop for Coordinator<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct CoordinatorBuilder<S: UiSurface> {
    configuration: Configuration,
    surface: S,
    capture: bool,
}

impl CoordinatorBuilder<LoggingSurface> {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            surface: LoggingSurface::new(),
            capture: true,
        }
    }
}

impl<S: UiSurface> CoordinatorBuilder<S> {
    // Sets the settings file, this will override the default configuration.
    pub fn settings_path(mut self, path: PathBuf) -> Self {
        self.configuration.settings_path = Some(path);
        self
    }

    // Adjusts the chart refresh cadence, this will override the default configuration.
    pub fn chart_refresh_interval_ms(mut self, interval_ms: u64) -> Self {
        self.configuration.chart_refresh_interval_ms = interval_ms;
        self
    }

    // Adjusts the histogram sampling cadence, this will override the default configuration.
    pub fn histogram_sample_interval_ms(mut self, interval_ms: u64) -> Self {
        self.configuration.histogram_sample_interval_ms = interval_ms;
        self
    }

    // Disables the built-in synthetic capture source; frames are then pushed by the caller.
    pub fn without_capture(mut self) -> Self {
        self.capture = false;
        self
    }

    pub fn surface<T: UiSurface>(self, surface: T) -> CoordinatorBuilder<T> {
        CoordinatorBuilder {
            configuration: self.configuration,
            surface,
            capture: self.capture,
        }
    }

    /// Spawns all tasks; must be called from within a tokio runtime.
    pub fn build(self) -> Result<Coordinator<S>, AppError> {
        self.configuration.validate()?;
        Ok(Coordinator::start(
            self.configuration,
            self.surface,
            self.capture,
        ))
    }
}
