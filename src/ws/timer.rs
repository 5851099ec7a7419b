use std::time::Duration;

use kameo::prelude::{ActorRef, Message as KameoMessage};
use tokio::task::JoinHandle;

use super::actor::LiveReloadEvent;

/// A single one-shot timer that delivers a [`LiveReloadEvent`] to an actor.
///
/// At most one timer is armed per slot. Every arm or cancel bumps the slot's
/// generation; a fired event only counts if its generation is still current,
/// which covers events that were already sitting in the mailbox when the timer
/// was cancelled.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    generation: u64,
    armed: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Replace any armed timer with a new one firing after `delay`.
    pub(crate) fn arm<A>(
        &mut self,
        actor_ref: &ActorRef<A>,
        delay: Duration,
        event: impl FnOnce(u64) -> LiveReloadEvent,
    ) where
        A: KameoMessage<LiveReloadEvent>,
    {
        self.cancel();
        let message = event(self.generation);
        let actor_ref = actor_ref.clone();
        self.armed = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = actor_ref.tell(message).send().await;
        }));
    }

    pub(crate) fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.armed.take() {
            handle.abort();
        }
    }

    /// Accept a fired event. Returns false for stale generations.
    pub(crate) fn fire(&mut self, generation: u64) -> bool {
        if self.armed.is_none() || generation != self.generation {
            return false;
        }
        self.armed = None;
        true
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.armed.take() {
            handle.abort();
        }
    }
}
