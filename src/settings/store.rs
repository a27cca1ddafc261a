use super::events::{ListenerList, SettingsDispatcher, SettingsEvent};
use super::medium::{SettingKey, SettingValue, SettingsMedium};
use crate::error::SettingsError;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const MIN_BAND_COUNT: u32 = 2;
pub const MAX_BAND_COUNT_LIMIT: u32 = 50;
pub const DEFAULT_MAX_BAND_COUNT: u32 = 20;
pub const DEFAULT_HISTOGRAM_VISIBLE: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsValues {
    pub band_count: u32,
    pub max_band_count: u32,
    pub histogram_visible: bool,
}

impl Default for SettingsValues {
    fn default() -> Self {
        Self {
            band_count: DEFAULT_MAX_BAND_COUNT / 2,
            max_band_count: DEFAULT_MAX_BAND_COUNT,
            histogram_visible: DEFAULT_HISTOGRAM_VISIBLE,
        }
    }
}

struct StoreState {
    medium: Box<dyn SettingsMedium>,
    values: Option<SettingsValues>,
}

impl StoreState {
    fn persist(&mut self, key: SettingKey, value: SettingValue) {
        if let Err(e) = self.medium.write(key, value) {
            warn!("Keeping {} in memory only: {}", key.as_str(), e);
        }
    }

    fn read_int(&self, key: SettingKey) -> Result<Option<i64>, SettingsError> {
        match self.medium.read(key)? {
            Some(SettingValue::Int(value)) => Ok(Some(value)),
            Some(other) => {
                warn!("Ignoring {} with unexpected value {:?}", key.as_str(), other);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn read_bool(&self, key: SettingKey) -> Result<Option<bool>, SettingsError> {
        match self.medium.read(key)? {
            Some(SettingValue::Bool(value)) => Ok(Some(value)),
            Some(other) => {
                warn!("Ignoring {} with unexpected value {:?}", key.as_str(), other);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Reads persisted values, writing defaults for missing ones and clamping
    /// out-of-range ones.
    fn load(&mut self) -> Result<SettingsValues, SettingsError> {
        let mut values = SettingsValues::default();

        match self.read_int(SettingKey::MaxBandCount)? {
            Some(stored) => {
                values.max_band_count =
                    clamp_setting(SettingKey::MaxBandCount, stored, MIN_BAND_COUNT, MAX_BAND_COUNT_LIMIT);
                if values.max_band_count as i64 != stored {
                    self.persist(SettingKey::MaxBandCount, int(values.max_band_count));
                }
                match self.read_int(SettingKey::BandCount)? {
                    Some(stored) => {
                        values.band_count = clamp_setting(
                            SettingKey::BandCount,
                            stored,
                            MIN_BAND_COUNT,
                            values.max_band_count,
                        );
                        if values.band_count as i64 != stored {
                            self.persist(SettingKey::BandCount, int(values.band_count));
                        }
                    }
                    None => {
                        values.band_count = (values.max_band_count / 2).max(MIN_BAND_COUNT);
                        self.persist(SettingKey::BandCount, int(values.band_count));
                    }
                }
            }
            None => {
                info!("No stored band settings, writing defaults");
                self.persist(SettingKey::MaxBandCount, int(values.max_band_count));
                self.persist(SettingKey::BandCount, int(values.band_count));
            }
        }

        match self.read_bool(SettingKey::HistogramVisible)? {
            Some(visible) => values.histogram_visible = visible,
            None => self.persist(
                SettingKey::HistogramVisible,
                SettingValue::Bool(values.histogram_visible),
            ),
        }

        Ok(values)
    }

    fn values(&mut self) -> &mut SettingsValues {
        if self.values.is_none() {
            let loaded = self.load().unwrap_or_else(|e| {
                warn!("Using default settings for this session: {}", e);
                SettingsValues::default()
            });
            debug!("Loaded settings {:?}", loaded);
            self.values = Some(loaded);
        }
        self.values.get_or_insert_with(SettingsValues::default)
    }
}

fn int(value: u32) -> SettingValue {
    SettingValue::Int(value as i64)
}

fn clamp_setting(key: SettingKey, requested: i64, min: u32, max: u32) -> u32 {
    let applied = requested.clamp(min as i64, max as i64);
    if applied != requested {
        warn!(
            "{}",
            SettingsError::OutOfRange {
                key: key.as_str(),
                requested,
                applied,
            }
        );
    }
    applied as u32
}

/// Validated band and histogram settings over a persisted medium.
///
/// Writes persist synchronously, then queue a [`SettingsEvent`] for the
/// [`SettingsDispatcher`]. A failed write keeps the new value in memory and
/// still notifies listeners.
#[derive(Clone)]
pub struct SettingsStore {
    state: Arc<Mutex<StoreState>>,
    listeners: ListenerList,
    event_tx: mpsc::UnboundedSender<SettingsEvent>,
}

impl SettingsStore {
    pub fn new(medium: Box<dyn SettingsMedium>) -> (Self, SettingsDispatcher) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let listeners: ListenerList = Arc::new(RwLock::new(Vec::new()));
        let store = Self {
            state: Arc::new(Mutex::new(StoreState {
                medium,
                values: None,
            })),
            listeners: Arc::clone(&listeners),
            event_tx,
        };
        (store, SettingsDispatcher::new(event_rx, listeners))
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn values(&self) -> SettingsValues {
        *self.lock().values()
    }

    pub fn band_count(&self) -> u32 {
        self.values().band_count
    }

    pub fn max_band_count(&self) -> u32 {
        self.values().max_band_count
    }

    pub fn histogram_visible(&self) -> bool {
        self.values().histogram_visible
    }

    /// Clamps to `[2, max_band_count]` and returns the stored value.
    pub fn set_band_count(&self, requested: i64) -> u32 {
        let mut state = self.lock();
        let max = state.values().max_band_count;
        let applied = clamp_setting(SettingKey::BandCount, requested, MIN_BAND_COUNT, max);
        state.values().band_count = applied;
        state.persist(SettingKey::BandCount, int(applied));
        debug!("Band count set to {}", applied);
        applied
    }

    /// Clamps to `[2, 50]`, lowers the band count if it no longer fits, and
    /// returns the stored maximum.
    pub fn set_max_band_count(&self, requested: i64) -> u32 {
        let applied = {
            let mut state = self.lock();
            let applied = clamp_setting(
                SettingKey::MaxBandCount,
                requested,
                MIN_BAND_COUNT,
                MAX_BAND_COUNT_LIMIT,
            );
            state.values().max_band_count = applied;
            state.persist(SettingKey::MaxBandCount, int(applied));

            if state.values().band_count > applied {
                state.values().band_count = applied;
                state.persist(SettingKey::BandCount, int(applied));
                debug!("Band count lowered to new maximum {}", applied);
            }
            applied
        };
        self.broadcast(SettingsEvent::MaxBandsChanged);
        applied
    }

    pub fn set_histogram_visible(&self, visible: bool) {
        {
            let mut state = self.lock();
            state.values().histogram_visible = visible;
            state.persist(SettingKey::HistogramVisible, SettingValue::Bool(visible));
        }
        self.broadcast(SettingsEvent::HistogramVisibilityChanged);
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(SettingsEvent) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(listener));
    }

    fn broadcast(&self, event: SettingsEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("No settings dispatcher running, {} not delivered", event.name());
        }
    }
}
