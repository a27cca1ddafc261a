pub mod events;
pub mod medium;
pub mod store;

use crate::error::SettingsError;
use std::path::Path;

pub use events::{SettingsDispatcher, SettingsEvent, SettingsListener};
pub use medium::{JsonFileMedium, MemoryMedium, SettingKey, SettingValue, SettingsMedium};
pub use store::{SettingsStore, SettingsValues};

/// Opens the file-backed medium, or an in-memory one when no path is configured.
pub fn open_medium(path: Option<&Path>) -> Result<Box<dyn SettingsMedium>, SettingsError> {
    match path {
        Some(path) => Ok(Box::new(JsonFileMedium::open(path)?)),
        None => Ok(Box::new(MemoryMedium::new())),
    }
}
