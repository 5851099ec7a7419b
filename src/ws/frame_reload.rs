//! Preview frame reload: scroll capture, cache-busted navigation, scroll restore
//! and the fallback to a full document reload when the frame fails to load.

use tracing::{debug, error, info};

use super::actor::{LiveReloadActor, LiveReloadEvent};
use super::timer::TimerSlot;
use crate::core::{CacheBuster, ReloadTarget, ScrollStage, WsReconnectStrategy};
use crate::host::{FrameLoadOutcome, ReloadHost, ScrollSnapshot};
use crate::transport::WsTransport;

/// A navigation that has not reported load or failure yet.
#[derive(Debug)]
pub(crate) struct InFlightFrameReload<F> {
    pub(crate) reload: u64,
    pub(crate) frame: F,
    pub(crate) snapshot: Option<ScrollSnapshot>,
}

/// Per-client frame reload bookkeeping.
#[derive(Debug)]
pub(crate) struct FrameReloadState<F> {
    pub(crate) in_flight: Option<InFlightFrameReload<F>>,
    reload_seq: u64,
    pub(crate) class_timer: TimerSlot,
    marked_frame: Option<F>,
    cache_buster: CacheBuster,
}

impl<F> FrameReloadState<F> {
    pub(crate) fn new(cache_bust_param: &str) -> Self {
        Self {
            in_flight: None,
            reload_seq: 0,
            class_timer: TimerSlot::default(),
            marked_frame: None,
            cache_buster: CacheBuster::new(cache_bust_param),
        }
    }
}

impl<H, R, T> LiveReloadActor<H, R, T>
where
    H: ReloadHost,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    /// Reload the preview frame if the page has one. Returns false when no
    /// frame matched, in which case the caller reloads the document.
    pub(crate) fn reload_frame(&mut self) -> bool {
        let Some(frame) = self.host.find_preview_frame(&self.config.preview_frame) else {
            debug!("no preview frame on page");
            return false;
        };

        let snapshot = match self.host.frame_scroll(&frame) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                debug!(error = %err, "could not read preview frame scroll");
                if let Some(observer) = &self.observer {
                    observer.on_frame_access_failed(ScrollStage::Capture, &err);
                }
                None
            }
        };

        self.mark_reloading(&frame);

        let src = self.frame.cache_buster.bust(&self.host.frame_src(&frame));
        self.frame.reload_seq = self.frame.reload_seq.wrapping_add(1);
        let reload = self.frame.reload_seq;
        info!(src = %src, "reloading preview frame");

        // A newer navigation replaces the old one; its settlement becomes stale.
        self.frame.in_flight = Some(InFlightFrameReload {
            reload,
            frame: frame.clone(),
            snapshot,
        });
        let load = self.host.navigate_frame(&frame, &src);
        let actor_ref = self.actor_ref.clone();
        tokio::spawn(async move {
            let outcome = load.await;
            let _ = actor_ref
                .tell(LiveReloadEvent::FrameLoadSettled { reload, outcome })
                .send()
                .await;
        });

        if let Some(observer) = &self.observer {
            observer.on_reload(ReloadTarget::PreviewFrame);
        }
        true
    }

    fn mark_reloading(&mut self, frame: &H::Frame) {
        let class = self.config.reloading_class.clone();
        // Frames are not comparable, so the previous mark is always cleared first.
        if let Some(previous) = self.frame.marked_frame.take() {
            self.host.set_frame_class(&previous, &class, false);
        }
        self.host.set_frame_class(frame, &class, true);
        self.frame.marked_frame = Some(frame.clone());
        let duration = self.config.reloading_class_duration;
        self.frame
            .class_timer
            .arm(&self.actor_ref, duration, |generation| {
                LiveReloadEvent::ClearReloadingState { generation }
            });
    }

    pub(crate) fn handle_clear_reloading_state(&mut self, generation: u64) {
        if !self.frame.class_timer.fire(generation) {
            debug!(generation, "stale reloading-class timer");
            return;
        }
        if let Some(frame) = self.frame.marked_frame.take() {
            let class = self.config.reloading_class.clone();
            self.host.set_frame_class(&frame, &class, false);
        }
    }

    pub(crate) fn handle_frame_load_settled(&mut self, reload: u64, outcome: FrameLoadOutcome) {
        let Some(in_flight) = self.frame.in_flight.take_if(|f| f.reload == reload) else {
            debug!(reload, "ignoring superseded frame load");
            return;
        };

        match outcome {
            FrameLoadOutcome::Loaded => {
                let Some(snapshot) = in_flight.snapshot else {
                    debug!("preview frame loaded");
                    return;
                };
                match self.host.restore_frame_scroll(&in_flight.frame, snapshot) {
                    Ok(()) => debug!(x = snapshot.x, y = snapshot.y, "preview frame scroll restored"),
                    Err(err) => {
                        debug!(error = %err, "could not restore preview frame scroll");
                        if let Some(observer) = &self.observer {
                            observer.on_frame_access_failed(ScrollStage::Restore, &err);
                        }
                    }
                }
            }
            FrameLoadOutcome::Failed => {
                error!("preview frame failed to load; reloading document");
                if let Some(observer) = &self.observer {
                    observer.on_frame_fallback();
                }
                self.host.reload_document();
                if let Some(observer) = &self.observer {
                    observer.on_reload(ReloadTarget::Document);
                }
            }
        }
    }
}
