//! # Event Listeners
//!
//! Delivers engine payloads from the coordinator's [`EventBus`] to a callback
//! on a dedicated task.
//!
//! Item listeners run through a [`Debouncer`]: payloads with the same status
//! are coalesced into the last one of a burst (trailing edge, window restarted
//! on every payload), while a payload with a new status first flushes whatever
//! is pending. A zero window delivers every payload as it arrives.
//!
//! [`EventBus`]: core_runtime::events::EventBus

use core_runtime::events::{EngineEvent, EventStream, RecvError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{trace, warn};

/// Per-subscription debounce state.
#[derive(Debug)]
enum DebounceState {
    Idle,
    Pending { event: EngineEvent, deadline: Instant },
}

#[derive(Debug)]
pub(crate) struct Debouncer {
    window: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
        }
    }

    /// Feed a payload received at `now`.
    ///
    /// Returns a payload that must be delivered right away: the flushed
    /// pending one on a status boundary, or `event` itself when the window
    /// is zero.
    pub(crate) fn push(&mut self, event: EngineEvent, now: Instant) -> Option<EngineEvent> {
        if self.window.is_zero() {
            return Some(event);
        }

        let deadline = now + self.window;
        match std::mem::replace(&mut self.state, DebounceState::Idle) {
            DebounceState::Pending { event: pending, .. } if pending.status != event.status => {
                self.state = DebounceState::Pending { event, deadline };
                Some(pending)
            }
            _ => {
                self.state = DebounceState::Pending { event, deadline };
                None
            }
        }
    }

    /// When the pending payload is due, if any.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        match &self.state {
            DebounceState::Idle => None,
            DebounceState::Pending { deadline, .. } => Some(*deadline),
        }
    }

    /// Take the pending payload, returning to idle.
    pub(crate) fn flush(&mut self) -> Option<EngineEvent> {
        match std::mem::replace(&mut self.state, DebounceState::Idle) {
            DebounceState::Idle => None,
            DebounceState::Pending { event, .. } => Some(event),
        }
    }
}

/// A running listener. Dropping the handle leaves the listener attached;
/// call [`remove`](ListenerHandle::remove) to detach it.
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Detach the listener. A pending debounced payload is discarded.
    pub fn remove(self) {
        self.task.abort();
    }

    /// Whether the listener task has stopped, either removed or because the
    /// event channel closed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a task delivering `stream` to `callback` through a debouncer with
/// the given window.
pub(crate) fn spawn<F>(mut stream: EventStream, window: Duration, callback: F) -> ListenerHandle
where
    F: Fn(EngineEvent) + Send + Sync + 'static,
{
    let task = tokio::spawn(async move {
        let mut debouncer = Debouncer::new(window);
        loop {
            let deadline = debouncer.deadline();
            tokio::select! {
                // A due payload goes out before anything received after it.
                biased;

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(event) = debouncer.flush() {
                        callback(event);
                    }
                }
                received = stream.recv() => match received {
                    Ok(event) => {
                        if let Some(ready) = debouncer.push(event, Instant::now()) {
                            callback(ready);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Listener fell behind the event channel");
                    }
                    Err(RecvError::Closed) => {
                        if let Some(event) = debouncer.flush() {
                            callback(event);
                        }
                        trace!("Event channel closed, listener stopping");
                        break;
                    }
                }
            }
        }
    });

    ListenerHandle { task }
}
