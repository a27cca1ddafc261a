pub mod capture;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod settings;

pub use config::Configuration;
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use error::{AppError, PipelineError, SettingsError};
