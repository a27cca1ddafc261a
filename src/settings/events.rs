use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Settings change notifications. Carry no payload: listeners re-read the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsEvent {
    HistogramVisibilityChanged,
    MaxBandsChanged,
}

impl SettingsEvent {
    pub fn name(self) -> &'static str {
        match self {
            SettingsEvent::HistogramVisibilityChanged => "HistogramVisibilityChanged",
            SettingsEvent::MaxBandsChanged => "MaxBandsValueChanged",
        }
    }
}

pub type SettingsListener = Box<dyn Fn(SettingsEvent) + Send + Sync>;

pub(crate) type ListenerList = Arc<RwLock<Vec<SettingsListener>>>;

/// Delivers events to the registered listeners off the writer's call stack.
pub struct SettingsDispatcher {
    event_rx: mpsc::UnboundedReceiver<SettingsEvent>,
    listeners: ListenerList,
}

impl SettingsDispatcher {
    pub(crate) fn new(
        event_rx: mpsc::UnboundedReceiver<SettingsEvent>,
        listeners: ListenerList,
    ) -> Self {
        Self {
            event_rx,
            listeners,
        }
    }

    fn deliver(&self, event: SettingsEvent) {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        debug!(
            "Delivering {} to {} listeners",
            event.name(),
            listeners.len()
        );
        for listener in listeners.iter() {
            listener(event);
        }
    }

    pub async fn run(mut self, cancel_token: CancellationToken) {
        info!("Settings dispatcher started");
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                event = self.event_rx.recv() => match event {
                    Some(event) => self.deliver(event),
                    None => break,
                }
            }
        }
        // listeners may hold handles back to the store
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        info!("Settings dispatcher stopped");
    }
}
