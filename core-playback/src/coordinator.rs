//! # Playback Coordinator
//!
//! The one object per process that every item, player and session is built
//! from. It owns what would otherwise be module-level globals:
//!
//! - identity key counters (items, players and sessions count independently)
//! - the active-item slot: at most one [`PlaybackItem`] holds the engine's
//!   exclusive playback resources at a time
//! - the native event channel
//!
//! The slot is a guarded weak reference, so items and the coordinator they
//! point at are freed once the caller drops them. It never deactivates anyone
//! by itself: `take` refuses while another item holds the slot, and the
//! activation transition deactivates that holder and tries again.

use crate::error::Result;
use crate::item::{PlaybackItem, WeakPlaybackItem};
use bridge_traits::{ItemKey, MediaEngine, PlayerKey, SessionKey};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EngineEvent, EventBus};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

pub struct PlaybackCoordinator {
    config: CoreConfig,
    events: EventBus,
    next_item_key: AtomicU64,
    next_player_key: AtomicU64,
    next_session_key: AtomicU64,
    active: Mutex<Option<WeakPlaybackItem>>,
}

impl PlaybackCoordinator {
    pub fn new(config: CoreConfig) -> Arc<Self> {
        let events = EventBus::new(config.event_buffer_size);
        Arc::new(Self {
            config,
            events,
            next_item_key: AtomicU64::new(0),
            next_player_key: AtomicU64::new(0),
            next_session_key: AtomicU64::new(0),
            active: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn media_engine(&self) -> &Arc<dyn MediaEngine> {
        &self.config.media_engine
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Hand a native payload to every listener.
    ///
    /// Returns how many subscribers saw it; payloads nobody listens to are
    /// dropped silently.
    pub fn dispatch(&self, event: EngineEvent) -> usize {
        match self.events.emit(event) {
            Ok(receivers) => receivers,
            Err(dropped) => {
                trace!(key = dropped.0.key, "No listeners for engine event");
                0
            }
        }
    }

    /// Construct a new item for `url`.
    pub fn create_item(self: &Arc<Self>, url: impl Into<String>) -> Result<PlaybackItem> {
        PlaybackItem::new(self, url)
    }

    pub(crate) fn allocate_item_key(&self) -> ItemKey {
        ItemKey::new(self.next_item_key.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn allocate_player_key(&self) -> PlayerKey {
        PlayerKey::new(self.next_player_key.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn allocate_session_key(&self) -> SessionKey {
        SessionKey::new(self.next_session_key.fetch_add(1, Ordering::Relaxed))
    }

    // ------------------------------------------------------------------------
    // Active-item slot
    // ------------------------------------------------------------------------

    /// The item currently holding the active slot.
    pub fn active_item(&self) -> Option<PlaybackItem> {
        self.active.lock().as_ref().and_then(WeakPlaybackItem::upgrade)
    }

    /// Key of the slot holder, even if every handle to it has been dropped.
    pub fn active_key(&self) -> Option<ItemKey> {
        self.active.lock().as_ref().map(WeakPlaybackItem::key)
    }

    pub fn is_active(&self, key: ItemKey) -> bool {
        self.active_key() == Some(key)
    }

    /// Put `item` in the slot unless another item holds it.
    ///
    /// Returns the current holder on refusal; the caller deactivates it and
    /// tries again. Taking a slot already held by `item` succeeds.
    pub(crate) fn take(&self, item: &PlaybackItem) -> std::result::Result<(), Holder> {
        let mut active = self.active.lock();
        match active.as_ref() {
            Some(holder) if holder.key() != item.key() => Err(match holder.upgrade() {
                Some(live) => Holder::Live(live),
                None => Holder::Dropped(holder.key()),
            }),
            _ => {
                *active = Some(item.downgrade());
                Ok(())
            }
        }
    }

    /// Clear the slot if `key` holds it. Returns whether it did.
    pub(crate) fn release(&self, key: ItemKey) -> bool {
        let mut active = self.active.lock();
        if active.as_ref().map(WeakPlaybackItem::key) == Some(key) {
            *active = None;
            true
        } else {
            false
        }
    }
}

/// The item that refused a `take`.
#[derive(Debug)]
pub(crate) enum Holder {
    Live(PlaybackItem),
    /// Every handle was dropped while it held the slot; the engine still
    /// considers it active.
    Dropped(ItemKey),
}

impl fmt::Debug for PlaybackCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackCoordinator")
            .field("active_key", &self.active_key())
            .field("events", &self.events)
            .finish()
    }
}
