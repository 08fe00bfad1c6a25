//! Playback bridge traits and supporting payload types.
//!
//! These abstractions let the core drive a platform media engine (AVPlayer,
//! MediaPlayer, a desktop pipeline) without knowing anything about decoding or
//! output. Every call is keyed by an identity key the core allocates, and every
//! call is fallible; the core never retries on its own.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

macro_rules! identity_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Construct a key from its raw ordinal.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw ordinal, as carried in engine calls and event payloads.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

identity_key!(
    /// Process-unique identity of a single playable media item.
    ItemKey
);
identity_key!(
    /// Process-unique identity of a multi-track player.
    PlayerKey
);
identity_key!(
    /// Process-unique identity of an audio session.
    SessionKey
);

/// Options forwarded with lifecycle calls (`prepare`, `activate`, ...).
///
/// The well-known fields are typed; anything else the host engine understands
/// rides along in `extra` and is flattened on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleOptions {
    /// Initial position in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    /// Initial playback rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    /// Interval between periodic "updated" events, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval: Option<u64>,
    /// Hint that the audio session stays up across a deactivation because
    /// another item is about to be activated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remain_active: bool,
    /// Engine-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LifecycleOptions {
    /// Set the initial position.
    pub fn with_position(mut self, position: f64) -> Self {
        self.position = Some(position);
        self
    }

    /// Set the initial playback rate.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Set the update interval hint.
    pub fn with_update_interval(mut self, millis: u64) -> Self {
        self.update_interval = Some(millis);
        self
    }

    /// Set the remain-active hint.
    pub fn with_remain_active(mut self, remain_active: bool) -> Self {
        self.remain_active = remain_active;
        self
    }

    /// Attach an engine-specific field.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Layer `self` over `defaults`: fields set on `self` win.
    pub fn merged_over(self, defaults: &LifecycleOptions) -> Self {
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra);
        Self {
            position: self.position.or(defaults.position),
            rate: self.rate.or(defaults.rate),
            update_interval: self.update_interval.or(defaults.update_interval),
            remain_active: self.remain_active || defaults.remain_active,
            extra,
        }
    }
}

/// Engine-reported metadata for a prepared or activated item.
///
/// The engine decides which fields exist; `duration` (seconds) is the only
/// one every engine reports after a successful prepare.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaMetadata(Map<String, Value>);

impl MediaMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up a raw field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Reported duration, when the engine provided a numeric one.
    pub fn duration(&self) -> Option<Duration> {
        self.0
            .get("duration")
            .and_then(Value::as_f64)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Shallow merge: fields of `other` replace fields of `self`.
    pub fn merge(&self, other: &MediaMetadata) -> MediaMetadata {
        let mut fields = self.0.clone();
        fields.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        MediaMetadata(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for MediaMetadata {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Options used when registering a player with the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOptions {
    /// Interval between periodic player events, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval: Option<u64>,
    /// Engine-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Playable window within the current track, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackRange {
    pub start: f64,
    pub end: Option<f64>,
}

/// Audio session configuration, passed through to the host audio stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub category: String,
    pub mode: String,
}

/// Engine operations for single media items.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Load `url` and allocate decode resources. Returns at least `duration`.
    async fn prepare_item(
        &self,
        key: ItemKey,
        url: String,
        options: LifecycleOptions,
    ) -> Result<MediaMetadata>;

    /// Give the item the exclusive playback resources.
    async fn activate_item(&self, key: ItemKey, options: LifecycleOptions)
        -> Result<MediaMetadata>;

    /// Take the exclusive playback resources away again.
    async fn deactivate_item(&self, key: ItemKey, options: LifecycleOptions) -> Result<()>;

    /// Free everything the engine holds for the item.
    async fn release_item(&self, key: ItemKey, options: LifecycleOptions) -> Result<()>;

    async fn play(&self, key: ItemKey) -> Result<()>;

    async fn pause(&self, key: ItemKey) -> Result<()>;

    /// Seek to `position`; returns the position the engine actually landed on.
    async fn seek(&self, key: ItemKey, position: Duration) -> Result<Duration>;

    async fn set_rate(&self, key: ItemKey, rate: f64) -> Result<()>;

    /// Forward-buffer hint.
    async fn set_buffer(&self, key: ItemKey, duration: Duration) -> Result<()>;

    async fn get_position(&self, key: ItemKey) -> Result<Duration>;

    async fn get_duration(&self, key: ItemKey) -> Result<Duration>;

    /// Engine status string (e.g. `"PLAYING"`, `"PAUSED"`, `"STALLED"`).
    async fn get_status(&self, key: ItemKey) -> Result<String>;
}

/// Engine operations for multi-track players.
///
/// Track lists are host JSON arrays; the engine owns their schema.
#[async_trait]
pub trait PlayerEngine: Send + Sync {
    async fn create_player(&self, key: PlayerKey, options: PlayerOptions) -> Result<()>;

    async fn insert_player_tracks(&self, key: PlayerKey, tracks: Value, advance: bool)
        -> Result<()>;

    async fn replace_player_tracks(
        &self,
        key: PlayerKey,
        tracks: Value,
        advance: bool,
    ) -> Result<()>;

    async fn next_player_track(&self, key: PlayerKey) -> Result<()>;

    async fn play_player(&self, key: PlayerKey) -> Result<()>;

    async fn pause_player(&self, key: PlayerKey) -> Result<()>;

    async fn toggle_player(&self, key: PlayerKey) -> Result<()>;

    async fn stop_player(&self, key: PlayerKey) -> Result<()>;

    /// Returns whether the seek completed (a newer seek may supersede it).
    async fn seek_player(&self, key: PlayerKey, position: f64) -> Result<bool>;

    /// Skip by a signed interval in seconds; returns whether it completed.
    async fn skip_player(&self, key: PlayerKey, interval: f64) -> Result<bool>;

    async fn set_player_rate(&self, key: PlayerKey, rate: f64) -> Result<()>;

    async fn set_player_range(&self, key: PlayerKey, range: PlaybackRange) -> Result<()>;
}

/// Engine operations for the audio session.
#[async_trait]
pub trait SessionEngine: Send + Sync {
    async fn activate_session(&self, key: SessionKey, options: SessionOptions) -> Result<()>;

    async fn deactivate_session(&self, key: SessionKey) -> Result<()>;
}
