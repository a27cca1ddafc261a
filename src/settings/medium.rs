use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    BandCount,
    MaxBandCount,
    HistogramVisible,
}

impl SettingKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::BandCount => "bandCount",
            SettingKey::MaxBandCount => "maxBandCount",
            SettingKey::HistogramVisible => "histogramVisible",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i64),
    Bool(bool),
}

/// Persisted key-value storage behind the settings store.
pub trait SettingsMedium: Send {
    fn read(&self, key: SettingKey) -> Result<Option<SettingValue>, SettingsError>;
    fn write(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError>;
}

#[derive(Debug, Default)]
pub struct MemoryMedium {
    values: HashMap<SettingKey, SettingValue>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: SettingKey, value: SettingValue) -> Self {
        self.values.insert(key, value);
        self
    }
}

impl SettingsMedium for MemoryMedium {
    fn read(&self, key: SettingKey) -> Result<Option<SettingValue>, SettingsError> {
        Ok(self.values.get(&key).copied())
    }

    fn write(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        self.values.insert(key, value);
        Ok(())
    }
}

/// Settings persisted as one JSON object, rewritten on every mutation.
#[derive(Debug)]
pub struct JsonFileMedium {
    path: PathBuf,
    values: serde_json::Map<String, serde_json::Value>,
}

impl JsonFileMedium {
    /// A missing file starts empty; an unreadable or malformed one is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                SettingsError::PersistenceUnavailable(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::Map::new(),
            Err(e) => {
                return Err(SettingsError::PersistenceUnavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };
        debug!("Opened settings file {}", path.display());
        Ok(Self { path, values })
    }

    fn flush(&self) -> Result<(), SettingsError> {
        let contents = serde_json::to_string_pretty(&self.values)
            .map_err(|e| SettingsError::PersistenceUnavailable(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| {
            SettingsError::PersistenceUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }
}

impl SettingsMedium for JsonFileMedium {
    fn read(&self, key: SettingKey) -> Result<Option<SettingValue>, SettingsError> {
        match self.values.get(key.as_str()) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| {
                    SettingsError::PersistenceUnavailable(format!("{}: {}", key.as_str(), e))
                }),
            None => Ok(None),
        }
    }

    fn write(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        let value = serde_json::to_value(value)
            .map_err(|e| SettingsError::PersistenceUnavailable(e.to_string()))?;
        self.values.insert(key.as_str().to_string(), value);
        self.flush()
    }
}
