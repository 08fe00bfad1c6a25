//! # Player
//!
//! An engine-side queue of tracks. Unlike [`PlaybackItem`](crate::PlaybackItem)
//! there is no local state machine: every call forwards straight to the
//! [`PlayerEngine`] under the player's key, after argument validation.

use crate::coordinator::PlaybackCoordinator;
use crate::error::{PlaybackError, Result};
use crate::listener::{self, ListenerHandle};
use bridge_traits::{PlaybackRange, PlayerEngine, PlayerKey, PlayerOptions};
use core_runtime::events::{EngineEvent, EventStream};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub struct Player {
    key: PlayerKey,
    engine: Arc<dyn PlayerEngine>,
    coordinator: Arc<PlaybackCoordinator>,
}

impl Player {
    /// Allocate a key and register it with the engine.
    ///
    /// The player is only handed out once the engine acknowledged it.
    ///
    /// # Errors
    ///
    /// `CapabilityMissing` if no player engine is configured; engine failures
    /// from `createPlayer` otherwise.
    pub async fn create(
        coordinator: &Arc<PlaybackCoordinator>,
        options: PlayerOptions,
    ) -> Result<Self> {
        let engine = coordinator.config().require_player_engine()?;
        let key = coordinator.allocate_player_key();

        engine.create_player(key, options).await?;
        info!(%key, "Player created");

        Ok(Self {
            key,
            engine,
            coordinator: Arc::clone(coordinator),
        })
    }

    pub fn key(&self) -> PlayerKey {
        self.key
    }

    /// Deliver payloads on channel `event_name` for this player. No debouncing.
    pub fn add_listener<F>(&self, event_name: impl Into<String>, callback: F) -> ListenerHandle
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        let name = event_name.into();
        let key = self.key.get();
        let stream = EventStream::new(self.coordinator.event_bus().subscribe())
            .filter(move |event| event.key == key && event.name == name);

        listener::spawn(stream, Duration::ZERO, callback)
    }

    pub fn remove_listener(&self, handle: ListenerHandle) {
        handle.remove();
    }

    // ------------------------------------------------------------------------
    // Tracks
    // ------------------------------------------------------------------------

    /// Append `tracks` (a JSON array of track objects) to the engine's queue.
    #[instrument(skip(self, tracks), fields(key = %self.key))]
    pub async fn insert_tracks(&self, tracks: Value, advance: bool) -> Result<()> {
        let count = validate_tracks(&tracks)?;
        debug!(count, advance, "Inserting tracks");
        Ok(self
            .engine
            .insert_player_tracks(self.key, tracks, advance)
            .await?)
    }

    /// Replace the engine's queue with `tracks`.
    #[instrument(skip(self, tracks), fields(key = %self.key))]
    pub async fn replace_tracks(&self, tracks: Value, advance: bool) -> Result<()> {
        let count = validate_tracks(&tracks)?;
        debug!(count, advance, "Replacing tracks");
        Ok(self
            .engine
            .replace_player_tracks(self.key, tracks, advance)
            .await?)
    }

    pub async fn next_track(&self) -> Result<()> {
        Ok(self.engine.next_player_track(self.key).await?)
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    pub async fn play(&self) -> Result<()> {
        Ok(self.engine.play_player(self.key).await?)
    }

    pub async fn pause(&self) -> Result<()> {
        Ok(self.engine.pause_player(self.key).await?)
    }

    pub async fn toggle(&self) -> Result<()> {
        Ok(self.engine.toggle_player(self.key).await?)
    }

    pub async fn stop(&self) -> Result<()> {
        Ok(self.engine.stop_player(self.key).await?)
    }

    /// Seek to `position` seconds. Returns whether the seek finished.
    pub async fn seek(&self, position: f64) -> Result<bool> {
        Ok(self.engine.seek_player(self.key, position).await?)
    }

    /// Skip by `interval` seconds (negative skips back).
    pub async fn skip(&self, interval: f64) -> Result<bool> {
        Ok(self.engine.skip_player(self.key, interval).await?)
    }

    pub async fn set_rate(&self, rate: f64) -> Result<()> {
        Ok(self.engine.set_player_rate(self.key, rate).await?)
    }

    /// Restrict playback of the current track to `range`.
    pub async fn set_range(&self, range: PlaybackRange) -> Result<()> {
        if let Some(end) = range.end {
            if end < range.start {
                return Err(PlaybackError::InvalidArgument(format!(
                    "range end {end} is before start {}",
                    range.start
                )));
            }
        }
        Ok(self.engine.set_player_range(self.key, range).await?)
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player").field("key", &self.key).finish()
    }
}

/// Check that `tracks` is an array of objects; returns its length.
fn validate_tracks(tracks: &Value) -> Result<usize> {
    let entries = tracks
        .as_array()
        .ok_or_else(|| PlaybackError::InvalidArgument("Expected array of tracks".to_string()))?;

    if let Some(index) = entries.iter().position(|track| !track.is_object()) {
        return Err(PlaybackError::InvalidArgument(format!(
            "Track at index {index} is not an object"
        )));
    }
    Ok(entries.len())
}
