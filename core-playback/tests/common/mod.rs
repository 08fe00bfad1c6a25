//! Shared fixtures for core-playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{
    ItemKey, LifecycleOptions, MediaEngine, MediaMetadata, PlaybackRange, PlayerEngine, PlayerKey,
    PlayerOptions, SessionEngine, SessionKey, SessionOptions,
};
use core_playback::PlaybackCoordinator;
use core_runtime::config::{CoreConfig, CoreConfigBuilder};
use core_runtime::events::EngineEvent;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// In-memory engine that records every call as `op(key)`.
///
/// Each call suspends once (or for `latency`, if set) so queued work can
/// interleave the way it would against a real engine.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<String>>,
    options: Mutex<Vec<(String, LifecycleOptions)>>,
    failures: Mutex<HashSet<&'static str>>,
    latency: Option<Duration>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency: Some(latency),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
        self.options.lock().clear();
    }

    /// Options received by lifecycle calls, as `(op(key), options)`.
    pub fn lifecycle_options(&self) -> Vec<(String, LifecycleOptions)> {
        self.options.lock().clone()
    }

    /// Make the next call to `op` fail.
    pub fn fail_once(&self, op: &'static str) {
        self.failures.lock().insert(op);
    }

    async fn call(&self, op: &'static str, key: u64) -> Result<()> {
        self.calls.lock().push(format!("{op}({key})"));
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        if self.failures.lock().remove(op) {
            return Err(BridgeError::OperationFailed(format!("{op} rejected")));
        }
        Ok(())
    }

    async fn lifecycle_call(
        &self,
        op: &'static str,
        key: ItemKey,
        options: LifecycleOptions,
    ) -> Result<()> {
        self.options
            .lock()
            .push((format!("{op}({key})"), options));
        self.call(op, key.get()).await
    }
}

#[async_trait]
impl MediaEngine for RecordingEngine {
    async fn prepare_item(
        &self,
        key: ItemKey,
        url: String,
        options: LifecycleOptions,
    ) -> Result<MediaMetadata> {
        self.lifecycle_call("prepare_item", key, options).await?;
        Ok(MediaMetadata::new().with("duration", 120.0).with("url", url))
    }

    async fn activate_item(&self, key: ItemKey, options: LifecycleOptions) -> Result<MediaMetadata> {
        self.lifecycle_call("activate_item", key, options).await?;
        Ok(MediaMetadata::new().with("activated", true))
    }

    async fn deactivate_item(&self, key: ItemKey, options: LifecycleOptions) -> Result<()> {
        self.lifecycle_call("deactivate_item", key, options).await
    }

    async fn release_item(&self, key: ItemKey, options: LifecycleOptions) -> Result<()> {
        self.lifecycle_call("release_item", key, options).await
    }

    async fn play(&self, key: ItemKey) -> Result<()> {
        self.call("play", key.get()).await
    }

    async fn pause(&self, key: ItemKey) -> Result<()> {
        self.call("pause", key.get()).await
    }

    async fn seek(&self, key: ItemKey, position: Duration) -> Result<Duration> {
        self.call("seek", key.get()).await?;
        Ok(position)
    }

    async fn set_rate(&self, key: ItemKey, _rate: f64) -> Result<()> {
        self.call("set_rate", key.get()).await
    }

    async fn set_buffer(&self, key: ItemKey, _duration: Duration) -> Result<()> {
        self.call("set_buffer", key.get()).await
    }

    async fn get_position(&self, key: ItemKey) -> Result<Duration> {
        self.call("get_position", key.get()).await?;
        Ok(Duration::from_secs(3))
    }

    async fn get_duration(&self, key: ItemKey) -> Result<Duration> {
        self.call("get_duration", key.get()).await?;
        Ok(Duration::from_secs(120))
    }

    async fn get_status(&self, key: ItemKey) -> Result<String> {
        self.call("get_status", key.get()).await?;
        Ok("playing".to_string())
    }
}

#[async_trait]
impl PlayerEngine for RecordingEngine {
    async fn create_player(&self, key: PlayerKey, _options: PlayerOptions) -> Result<()> {
        self.call("create_player", key.get()).await
    }

    async fn insert_player_tracks(&self, key: PlayerKey, _tracks: Value, advance: bool) -> Result<()> {
        self.call(
            if advance { "insert_player_tracks+advance" } else { "insert_player_tracks" },
            key.get(),
        )
        .await
    }

    async fn replace_player_tracks(&self, key: PlayerKey, _tracks: Value, advance: bool) -> Result<()> {
        self.call(
            if advance { "replace_player_tracks+advance" } else { "replace_player_tracks" },
            key.get(),
        )
        .await
    }

    async fn next_player_track(&self, key: PlayerKey) -> Result<()> {
        self.call("next_player_track", key.get()).await
    }

    async fn play_player(&self, key: PlayerKey) -> Result<()> {
        self.call("play_player", key.get()).await
    }

    async fn pause_player(&self, key: PlayerKey) -> Result<()> {
        self.call("pause_player", key.get()).await
    }

    async fn toggle_player(&self, key: PlayerKey) -> Result<()> {
        self.call("toggle_player", key.get()).await
    }

    async fn stop_player(&self, key: PlayerKey) -> Result<()> {
        self.call("stop_player", key.get()).await
    }

    async fn seek_player(&self, key: PlayerKey, _position: f64) -> Result<bool> {
        self.call("seek_player", key.get()).await?;
        Ok(true)
    }

    async fn skip_player(&self, key: PlayerKey, _interval: f64) -> Result<bool> {
        self.call("skip_player", key.get()).await?;
        Ok(false)
    }

    async fn set_player_rate(&self, key: PlayerKey, _rate: f64) -> Result<()> {
        self.call("set_player_rate", key.get()).await
    }

    async fn set_player_range(&self, key: PlayerKey, _range: PlaybackRange) -> Result<()> {
        self.call("set_player_range", key.get()).await
    }
}

#[async_trait]
impl SessionEngine for RecordingEngine {
    async fn activate_session(&self, key: SessionKey, _options: SessionOptions) -> Result<()> {
        self.call("activate_session", key.get()).await
    }

    async fn deactivate_session(&self, key: SessionKey) -> Result<()> {
        self.call("deactivate_session", key.get()).await
    }
}

/// Builder with `engine` wired in for every capability.
pub fn config_builder(engine: &Arc<RecordingEngine>) -> CoreConfigBuilder {
    CoreConfig::builder()
        .media_engine(Arc::clone(engine) as Arc<dyn MediaEngine>)
        .player_engine(Arc::clone(engine) as Arc<dyn PlayerEngine>)
        .session_engine(Arc::clone(engine) as Arc<dyn SessionEngine>)
}

pub fn coordinator(engine: &Arc<RecordingEngine>) -> Arc<PlaybackCoordinator> {
    PlaybackCoordinator::new(config_builder(engine).build().unwrap())
}

/// Collects delivered payloads.
#[derive(Clone, Default)]
pub struct Deliveries(Arc<Mutex<Vec<EngineEvent>>>);

impl Deliveries {
    pub fn callback(&self) -> impl Fn(EngineEvent) + Send + Sync + 'static {
        let sink = Arc::clone(&self.0);
        move |event| sink.lock().push(event)
    }

    pub fn statuses(&self) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .map(|event| event.status.clone().unwrap_or_default())
            .collect()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}
