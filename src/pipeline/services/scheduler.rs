use std::sync::{
    atomic::{AtomicBool, AtomicU8, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const IDLE: u8 = 0;
const PROCESSING: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Processing,
}

/// Admits at most one frame at a time. Frames arriving while one is in
/// flight are dropped, never queued.
#[derive(Debug, Clone, Default)]
pub struct FrameScheduler {
    state: Arc<AtomicU8>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle -> Processing. Returns `None` when a frame is already in flight.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        self.state
            .compare_exchange(IDLE, PROCESSING, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AdmissionPermit {
                state: Arc::clone(&self.state),
            })
    }

    pub fn state(&self) -> SchedulerState {
        match self.state.load(Ordering::Acquire) {
            IDLE => SchedulerState::Idle,
            _ => SchedulerState::Processing,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == SchedulerState::Idle
    }
}

/// Held for the lifetime of one processing cycle; dropping it returns the
/// scheduler to Idle, including when the cycle fails or panics.
#[derive(Debug)]
pub struct AdmissionPermit {
    state: Arc<AtomicU8>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.state.store(IDLE, Ordering::Release);
    }
}

/// Rate limiter for histogram sampling: a timer marks sampling as due and the
/// next admitted frame consumes it.
#[derive(Debug, Clone)]
pub struct SamplingGate {
    due: Arc<AtomicBool>,
}

impl Default for SamplingGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplingGate {
    /// Starts due so the first admitted frame produces a histogram.
    pub fn new() -> Self {
        Self {
            due: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn mark_due(&self) {
        self.due.store(true, Ordering::Release);
    }

    pub fn is_due(&self) -> bool {
        self.due.load(Ordering::Acquire)
    }

    /// Consumes the due flag. Returns whether sampling should happen now.
    pub fn take_due(&self) -> bool {
        self.due.swap(false, Ordering::AcqRel)
    }
}

pub fn spawn_sampling_timer(
    gate: SamplingGate,
    interval: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Histogram sampling timer stopped");
                    break;
                }
                _ = ticker.tick() => gate.mark_due(),
            }
        }
    })
}
