use super::{DisplaySink, UiSurface};
use crate::pipeline::types::Frame;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Frame(Frame),
    Histogram(Vec<f64>),
}

/// Receiving half of a [`UiHandle`], consumed by [`run_ui_loop`].
pub struct UiReceiver {
    update_rx: mpsc::Receiver<UiUpdate>,
    visibility_rx: watch::Receiver<bool>,
}

impl UiReceiver {
    pub async fn recv(&mut self) -> Option<UiUpdate> {
        self.update_rx.recv().await
    }

    pub fn chart_visible(&self) -> bool {
        *self.visibility_rx.borrow()
    }
}

/// Marshals display updates onto the single UI task.
///
/// Frames and histograms go through a bounded queue and are dropped when it
/// is full. Chart visibility is a latest-value cell, so the UI always ends
/// on the most recent state.
#[derive(Clone)]
pub struct UiHandle {
    update_tx: mpsc::Sender<UiUpdate>,
    visibility_tx: Arc<watch::Sender<bool>>,
}

impl UiHandle {
    pub fn new(buffer_size: usize) -> (Self, UiReceiver) {
        let (update_tx, update_rx) = mpsc::channel(buffer_size);
        let (visibility_tx, visibility_rx) = watch::channel(true);
        (
            Self {
                update_tx,
                visibility_tx: Arc::new(visibility_tx),
            },
            UiReceiver {
                update_rx,
                visibility_rx,
            },
        )
    }

    fn send(&self, update: UiUpdate) {
        if let Err(e) = self.update_tx.try_send(update) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    debug!("UI update queue full, dropping update");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!("UI task is gone, dropping update");
                }
            }
        }
    }
}

impl DisplaySink for UiHandle {
    fn show_frame(&self, frame: Frame) {
        self.send(UiUpdate::Frame(frame));
    }

    fn show_histogram(&self, percentages: Vec<f64>) {
        self.send(UiUpdate::Histogram(percentages));
    }

    fn set_chart_visible(&self, visible: bool) {
        self.visibility_tx.send_replace(visible);
    }
}

/// Applies every update on one task, so the surface is only touched from a
/// single context. Returns the surface when the handle is dropped or on cancel.
pub async fn run_ui_loop<S: UiSurface>(
    receiver: UiReceiver,
    mut surface: S,
    cancel_token: CancellationToken,
) -> S {
    let UiReceiver {
        mut update_rx,
        mut visibility_rx,
    } = receiver;
    info!("UI loop started");

    let mut chart_visible = *visibility_rx.borrow_and_update();
    surface.set_chart_visible(chart_visible);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            update = update_rx.recv() => match update {
                Some(UiUpdate::Frame(frame)) => surface.render_frame(frame),
                Some(UiUpdate::Histogram(percentages)) => surface.render_histogram(&percentages),
                None => break,
            },
            changed = visibility_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let visible = *visibility_rx.borrow_and_update();
                if visible != chart_visible {
                    chart_visible = visible;
                    surface.set_chart_visible(visible);
                }
            }
        }
    }

    // a change may land after the last select
    let visible = *visibility_rx.borrow();
    if visible != chart_visible {
        surface.set_chart_visible(visible);
    }
    info!("UI loop stopped");
    surface
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::LoggingSurface;
    use crate::pipeline::types::PixelLayout;
    use std::time::Duration;

    #[tokio::test]
    async fn updates_reach_the_surface_in_order() {
        let (handle, receiver) = UiHandle::new(4);
        let cancel_token = CancellationToken::new();
        let ui_task = tokio::spawn(run_ui_loop(
            receiver,
            LoggingSurface::new(),
            cancel_token.clone(),
        ));

        handle.show_frame(Frame::solid(2, 2, PixelLayout::Bgra, [1, 1, 1]));
        handle.show_histogram(vec![0.0; 256]);
        drop(handle);

        let surface = ui_task.await.unwrap();
        assert_eq!(surface.frames_rendered(), 1);
        assert_eq!(surface.histograms_rendered(), 1);
        assert!(surface.last_frame().is_some());
    }

    #[tokio::test]
    async fn full_queue_drops_frames_without_blocking() {
        let (handle, mut receiver) = UiHandle::new(1);
        handle.show_frame(Frame::solid(1, 1, PixelLayout::Bgra, [0, 0, 0]));
        handle.show_frame(Frame::solid(1, 1, PixelLayout::Bgra, [9, 9, 9]));
        drop(handle);

        let first = receiver.recv().await.unwrap();
        assert!(matches!(first, UiUpdate::Frame(f) if f.pixel_rgb(0, 0) == (0, 0, 0)));
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn visibility_is_kept_even_with_a_full_queue() {
        let (handle, receiver) = UiHandle::new(1);
        handle.show_frame(Frame::solid(1, 1, PixelLayout::Bgra, [0, 0, 0]));
        handle.set_chart_visible(false);
        assert!(!receiver.chart_visible());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rapid_visibility_toggles_end_on_the_last_state() {
        let (handle, receiver) = UiHandle::new(4);
        let cancel_token = CancellationToken::new();
        let ui_task = tokio::spawn(run_ui_loop(
            receiver,
            LoggingSurface::new(),
            cancel_token.clone(),
        ));

        let togglers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        handle.set_chart_visible(false);
                        handle.set_chart_visible(true);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for toggler in togglers {
            toggler.await.unwrap();
        }
        handle.set_chart_visible(false);
        handle.set_chart_visible(true);
        handle.set_chart_visible(false);
        tokio::time::sleep(Duration::from_millis(20)).await;

        cancel_token.cancel();
        let surface = ui_task.await.unwrap();
        assert!(!surface.chart_visible());
    }

    #[tokio::test]
    async fn hide_then_show_leaves_the_chart_visible() {
        let (handle, receiver) = UiHandle::new(4);
        let cancel_token = CancellationToken::new();
        let ui_task = tokio::spawn(run_ui_loop(
            receiver,
            LoggingSurface::new(),
            cancel_token.clone(),
        ));

        for _ in 0..2000 {
            handle.set_chart_visible(false);
            handle.set_chart_visible(true);
        }
        drop(handle);

        let surface = ui_task.await.unwrap();
        assert!(surface.chart_visible());
    }
}
