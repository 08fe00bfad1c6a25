//! # Playback Item
//!
//! A single media resource driven through the engine's lifecycle:
//!
//! ```text
//!                 prepare               activate
//!  instantiated ───────────> prepared ─────────────> activated
//!       │  └──────── activate ─────────────────────────^  │
//!       │                      ^        deactivate         │
//!       │                      └───────────────────────────┘
//!       └──── release ────> released <──── release ─────────
//! ```
//!
//! Every lifecycle call goes through the item's [`TransitionQueue`], so a
//! `release()` issued right after an `activate()` waits for the activation to
//! finish at the engine before it starts. Playback controls bypass the queue
//! and only check the committed state before forwarding.
//!
//! Items are cheap handles: clones share the same queue and cached metadata.

use crate::coordinator::{Holder, PlaybackCoordinator};
use crate::error::{PlaybackError, Result};
use crate::fsm::{Failure, Pending, StateTable, TransitionQueue};
use crate::listener::{self, ListenerHandle};
use async_trait::async_trait;
use bridge_traits::{ItemKey, LifecycleOptions, MediaEngine, MediaMetadata};
use core_runtime::config::EventScope;
use core_runtime::events::{EngineEvent, EventStream};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

/// Committed lifecycle state of a [`PlaybackItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Instantiated,
    Prepared,
    Activated,
    /// Terminal.
    Released,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Instantiated => "instantiated",
            LifecycleState::Prepared => "prepared",
            LifecycleState::Activated => "activated",
            LifecycleState::Released => "released",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEdge {
    Prepare,
    Activate,
    Deactivate,
    Release,
}

impl fmt::Display for LifecycleEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleEdge::Prepare => "prepare",
            LifecycleEdge::Activate => "activate",
            LifecycleEdge::Deactivate => "deactivate",
            LifecycleEdge::Release => "release",
        })
    }
}

/// Transition context: everything the lifecycle effects touch.
///
/// Holds only a weak link back to the item so the queue worker, which owns
/// an `Arc<Lifecycle>`, does not keep the item alive.
struct Lifecycle {
    key: ItemKey,
    url: String,
    coordinator: Arc<PlaybackCoordinator>,
    handle: OnceLock<Weak<ItemShared>>,
    prepared: Mutex<Option<MediaMetadata>>,
    activated: Mutex<Option<MediaMetadata>>,
}

impl Lifecycle {
    fn engine(&self) -> &Arc<dyn MediaEngine> {
        self.coordinator.media_engine()
    }

    fn cached_prepared(&self) -> Option<MediaMetadata> {
        self.prepared.lock().clone()
    }

    fn cached_activated(&self) -> Option<MediaMetadata> {
        self.activated.lock().clone()
    }

    fn item(&self) -> Result<PlaybackItem> {
        self.handle
            .get()
            .and_then(Weak::upgrade)
            .map(|shared| PlaybackItem { shared })
            .ok_or_else(|| {
                PlaybackError::InvariantViolation(format!(
                    "item {} dropped while a transition was running",
                    self.key
                ))
            })
    }

    async fn prepare_effect(&self, options: LifecycleOptions) -> Result<MediaMetadata> {
        let metadata = self
            .engine()
            .prepare_item(self.key, self.url.clone(), options)
            .await?;
        *self.prepared.lock() = Some(metadata.clone());
        debug!(key = %self.key, duration = ?metadata.duration(), "Item prepared");
        Ok(metadata)
    }

    async fn activate_effect(&self, options: LifecycleOptions) -> Result<MediaMetadata> {
        let prepared = self.cached_prepared().ok_or_else(|| {
            PlaybackError::InvariantViolation(format!(
                "item {} activated before it was prepared",
                self.key
            ))
        })?;
        let this = self.item()?;

        // The holder can change while we await its deactivation.
        loop {
            match self.coordinator.take(&this) {
                Ok(()) => break,
                Err(Holder::Live(holder)) => {
                    debug!(key = %self.key, holder = %holder.key(), "Deactivating current holder");
                    match holder.deactivate(handover_options()).await {
                        // A released holder has already cleared the slot.
                        Ok(()) | Err(PlaybackError::Released) => {}
                        Err(err) => return Err(err),
                    }
                }
                // No queue left to go through; deactivate at the engine directly.
                Err(Holder::Dropped(stale)) => {
                    debug!(key = %self.key, holder = %stale, "Deactivating dropped holder");
                    self.engine().deactivate_item(stale, handover_options()).await?;
                    self.coordinator.release(stale);
                }
            }
        }

        let activated = match self.engine().activate_item(self.key, options).await {
            Ok(activated) => activated,
            Err(err) => {
                self.coordinator.release(self.key);
                return Err(err.into());
            }
        };

        if !self.coordinator.is_active(self.key) {
            return Err(PlaybackError::InvariantViolation(format!(
                "item {} lost the active slot during activation",
                self.key
            )));
        }

        let merged = prepared.merge(&activated);
        *self.activated.lock() = Some(merged.clone());
        info!(key = %self.key, "Item activated");
        Ok(merged)
    }

    async fn deactivate_effect(&self, options: LifecycleOptions) -> Result<()> {
        if !self.coordinator.is_active(self.key) {
            return Err(PlaybackError::InvariantViolation(format!(
                "item {} is activated but does not hold the active slot",
                self.key
            )));
        }

        self.engine().deactivate_item(self.key, options).await?;
        self.coordinator.release(self.key);
        *self.activated.lock() = None;
        info!(key = %self.key, "Item deactivated");
        Ok(())
    }

    async fn release_effect(&self, options: LifecycleOptions) -> Result<()> {
        self.engine().release_item(self.key, options).await?;
        self.coordinator.release(self.key);
        *self.activated.lock() = None;
        info!(key = %self.key, "Item released");
        Ok(())
    }
}

#[async_trait]
impl StateTable for Lifecycle {
    type State = LifecycleState;
    type Edge = LifecycleEdge;
    type Args = LifecycleOptions;
    type Output = Option<MediaMetadata>;

    fn declares(&self, _state: LifecycleState) -> bool {
        true
    }

    // Total over state x edge; `released` rejects inside the transition so
    // callers see the terminal-state error rather than an invalid edge.
    fn accepts(&self, _state: LifecycleState, _edge: LifecycleEdge) -> bool {
        true
    }

    async fn transition(
        &self,
        state: LifecycleState,
        edge: LifecycleEdge,
        options: LifecycleOptions,
    ) -> std::result::Result<(LifecycleState, Option<MediaMetadata>), Failure<LifecycleState>> {
        use LifecycleEdge as E;
        use LifecycleState as S;

        match (state, edge) {
            (S::Released, E::Release) => Ok((S::Released, None)),
            (S::Released, _) => Err(PlaybackError::Released.into()),

            (S::Instantiated, E::Prepare) => {
                let prepared = self.prepare_effect(options).await?;
                Ok((S::Prepared, Some(prepared)))
            }
            (S::Prepared | S::Activated, E::Prepare) => Ok((state, self.cached_prepared())),

            // Once prepared, a failed activation leaves the item prepared.
            (S::Instantiated, E::Activate) => {
                self.prepare_effect(options.clone()).await?;
                let activated = self
                    .activate_effect(options)
                    .await
                    .map_err(|err| Failure::settle_in(S::Prepared, err))?;
                Ok((S::Activated, Some(activated)))
            }
            (S::Prepared, E::Activate) => {
                let activated = self.activate_effect(options).await?;
                Ok((S::Activated, Some(activated)))
            }
            (S::Activated, E::Activate) => Ok((S::Activated, self.cached_activated())),

            (S::Activated, E::Deactivate) => {
                self.deactivate_effect(options).await?;
                Ok((S::Prepared, None))
            }
            (S::Instantiated | S::Prepared, E::Deactivate) => Ok((state, None)),

            // Nothing was allocated at the engine yet.
            (S::Instantiated, E::Release) => Ok((S::Released, None)),
            (S::Prepared, E::Release) => {
                self.release_effect(options).await?;
                Ok((S::Released, None))
            }
            // The slot is already given up when `releaseItem` fails, so the
            // item is prepared from then on and `release` can be retried.
            (S::Activated, E::Release) => {
                self.deactivate_effect(options.clone()).await?;
                self.release_effect(options)
                    .await
                    .map_err(|err| Failure::settle_in(S::Prepared, err))?;
                Ok((S::Released, None))
            }
        }
    }
}

fn handover_options() -> LifecycleOptions {
    LifecycleOptions::default().with_remain_active(true)
}

struct ItemShared {
    lifecycle: Arc<Lifecycle>,
    queue: TransitionQueue<Lifecycle>,
}

/// Handle to one media item.
#[derive(Clone)]
pub struct PlaybackItem {
    shared: Arc<ItemShared>,
}

impl PlaybackItem {
    /// Create an item for `url` in the `instantiated` state.
    ///
    /// Must be called inside a Tokio runtime; the item's transition worker is
    /// spawned here.
    pub fn new(coordinator: &Arc<PlaybackCoordinator>, url: impl Into<String>) -> Result<Self> {
        let lifecycle = Arc::new(Lifecycle {
            key: coordinator.allocate_item_key(),
            url: url.into(),
            coordinator: Arc::clone(coordinator),
            handle: OnceLock::new(),
            prepared: Mutex::new(None),
            activated: Mutex::new(None),
        });
        let queue = TransitionQueue::new(Arc::clone(&lifecycle), LifecycleState::Instantiated)?;
        let shared = Arc::new(ItemShared {
            lifecycle: Arc::clone(&lifecycle),
            queue,
        });
        // Freshly created lock, the set cannot fail.
        let _ = lifecycle.handle.set(Arc::downgrade(&shared));

        debug!(key = %lifecycle.key, url = %redact_url(&lifecycle.url), "Item created");
        Ok(Self { shared })
    }

    pub fn key(&self) -> ItemKey {
        self.shared.lifecycle.key
    }

    pub(crate) fn downgrade(&self) -> WeakPlaybackItem {
        WeakPlaybackItem {
            key: self.key(),
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn url(&self) -> &str {
        &self.shared.lifecycle.url
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.queue.state()
    }

    /// Watch committed lifecycle states.
    pub fn state_changes(&self) -> watch::Receiver<LifecycleState> {
        self.shared.queue.subscribe()
    }

    /// Metadata returned by `prepareItem`, once prepared.
    pub fn prepared(&self) -> Option<MediaMetadata> {
        self.shared.lifecycle.cached_prepared()
    }

    /// Prepared metadata merged with `activateItem`'s, while activated.
    pub fn activated(&self) -> Option<MediaMetadata> {
        self.shared.lifecycle.cached_activated()
    }

    /// Whether this item holds the coordinator's active slot.
    pub fn is_active(&self) -> bool {
        self.shared.lifecycle.coordinator.is_active(self.key())
    }

    fn engine(&self) -> &Arc<dyn MediaEngine> {
        self.shared.lifecycle.engine()
    }

    fn submit(&self, edge: LifecycleEdge, options: LifecycleOptions) -> Pending<Option<MediaMetadata>> {
        let defaults = &self.shared.lifecycle.coordinator.config().default_lifecycle_options;
        self.shared.queue.advance(edge, options.merged_over(defaults))
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------
    //
    // Each call is queued before it returns; the returned future only
    // observes the outcome.

    pub fn prepare(
        &self,
        options: LifecycleOptions,
    ) -> impl Future<Output = Result<MediaMetadata>> + Send + 'static {
        let key = self.key();
        let pending = self.submit(LifecycleEdge::Prepare, options);
        async move { pending.await?.ok_or_else(|| missing_metadata(key, "prepared")) }
    }

    /// Prepare if needed, deactivate whichever item is active, then activate.
    pub fn activate(
        &self,
        options: LifecycleOptions,
    ) -> impl Future<Output = Result<MediaMetadata>> + Send + 'static {
        let key = self.key();
        let pending = self.submit(LifecycleEdge::Activate, options);
        async move { pending.await?.ok_or_else(|| missing_metadata(key, "activated")) }
    }

    pub fn deactivate(
        &self,
        options: LifecycleOptions,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let pending = self.submit(LifecycleEdge::Deactivate, options);
        async move { pending.await.map(drop) }
    }

    /// Release engine resources. Idempotent; every other edge fails afterwards.
    pub fn release(
        &self,
        options: LifecycleOptions,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let pending = self.submit(LifecycleEdge::Release, options);
        async move { pending.await.map(drop) }
    }

    // ------------------------------------------------------------------------
    // Playback controls
    // ------------------------------------------------------------------------

    fn require(&self, action: &'static str, allowed: &[LifecycleState]) -> Result<()> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(PlaybackError::Precondition {
                action,
                state: state.to_string(),
            })
        }
    }

    const LOADED: &'static [LifecycleState] = &[LifecycleState::Prepared, LifecycleState::Activated];
    const ACTIVE: &'static [LifecycleState] = &[LifecycleState::Activated];

    #[instrument(skip(self), fields(key = %self.key()))]
    pub async fn play(&self) -> Result<()> {
        self.require("play", Self::ACTIVE)?;
        Ok(self.engine().play(self.key()).await?)
    }

    #[instrument(skip(self), fields(key = %self.key()))]
    pub async fn pause(&self) -> Result<()> {
        self.require("pause", Self::ACTIVE)?;
        Ok(self.engine().pause(self.key()).await?)
    }

    /// Seek to `position`; returns the position the engine settled on.
    #[instrument(skip(self), fields(key = %self.key()))]
    pub async fn seek(&self, position: Duration) -> Result<Duration> {
        self.require("seek", Self::LOADED)?;
        Ok(self.engine().seek(self.key(), position).await?)
    }

    pub async fn set_rate(&self, rate: f64) -> Result<()> {
        self.require("set_rate", Self::LOADED)?;
        if !rate.is_finite() {
            return Err(PlaybackError::InvalidArgument(format!("rate must be finite, got {rate}")));
        }
        Ok(self.engine().set_rate(self.key(), rate).await?)
    }

    pub async fn set_buffer(&self, duration: Duration) -> Result<()> {
        self.require("set_buffer", Self::LOADED)?;
        Ok(self.engine().set_buffer(self.key(), duration).await?)
    }

    pub async fn get_position(&self) -> Result<Duration> {
        self.require("get_position", Self::LOADED)?;
        Ok(self.engine().get_position(self.key()).await?)
    }

    pub async fn get_duration(&self) -> Result<Duration> {
        self.require("get_duration", Self::LOADED)?;
        Ok(self.engine().get_duration(self.key()).await?)
    }

    pub async fn get_status(&self) -> Result<String> {
        self.require("get_status", Self::LOADED)?;
        Ok(self.engine().get_status(self.key()).await?)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Deliver this item's `updated` payloads to `callback`.
    ///
    /// Same-status bursts are coalesced over the configured debounce window;
    /// a status change flushes the pending payload first. Subscribes before
    /// returning, so payloads dispatched afterwards are never missed.
    pub fn add_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        let coordinator = &self.shared.lifecycle.coordinator;
        let config = coordinator.config();
        let key = self.key();

        let stream = EventStream::new(coordinator.event_bus().subscribe());
        let stream = match config.event_scope {
            EventScope::Key => stream
                .filter(move |event| event.is_updated() && event.status.is_some() && event.key == key.get()),
            EventScope::ActiveItem => {
                let coordinator = Arc::downgrade(coordinator);
                stream.filter(move |event| {
                    event.is_updated()
                        && event.status.is_some()
                        && coordinator
                            .upgrade()
                            .is_some_and(|coordinator| coordinator.is_active(key))
                })
            }
        };

        listener::spawn(stream, config.listener_debounce, callback)
    }

    pub fn remove_listener(&self, handle: ListenerHandle) {
        handle.remove();
    }
}

/// Non-owning item handle; what the coordinator's active slot stores.
#[derive(Clone)]
pub(crate) struct WeakPlaybackItem {
    key: ItemKey,
    shared: Weak<ItemShared>,
}

impl WeakPlaybackItem {
    pub(crate) fn key(&self) -> ItemKey {
        self.key
    }

    pub(crate) fn upgrade(&self) -> Option<PlaybackItem> {
        self.shared.upgrade().map(|shared| PlaybackItem { shared })
    }
}

fn missing_metadata(key: ItemKey, which: &str) -> PlaybackError {
    PlaybackError::InvariantViolation(format!("item {key} has no {which} metadata"))
}

impl fmt::Debug for PlaybackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackItem")
            .field("key", &self.key())
            .field("url", &redact_url(self.url()))
            .field("state", &self.state())
            .finish()
    }
}
