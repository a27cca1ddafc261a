use bandscope::{AppError, Configuration, CoordinatorBuilder};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

fn init_logging() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logging();
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let configuration = Configuration::load(config_path.as_deref())?;
    let run_seconds = configuration.run_seconds;
    let snapshot_path = configuration.snapshot_path.clone();

    let coordinator = CoordinatorBuilder::new(configuration).build()?;
    info!(
        "Running with {} bands, histogram {}",
        coordinator.settings().band_count(),
        if coordinator.settings().histogram_visible() {
            "visible"
        } else {
            "hidden"
        }
    );

    match run_seconds {
        Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
        None => tokio::signal::ctrl_c().await?,
    }
    info!("Shutting down");

    let stats = coordinator.orchestrator().stats();
    let surface = coordinator.wait().await?;
    info!(
        "{} frames rendered, {} histograms, avg transform {:.0}us, {:.1} fps",
        surface.frames_rendered(),
        surface.histograms_rendered(),
        stats.avg_transform_us,
        stats.frames_per_second
    );

    if let Some(path) = snapshot_path {
        if !surface.save_snapshot(&path)? {
            info!("No frame rendered, snapshot skipped");
        }
    }
    Ok(())
}
