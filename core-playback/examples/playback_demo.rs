//! # Playback Lifecycle Example
//!
//! Drives two items through an in-memory engine: activate the first, hand the
//! active slot over to the second, then release both. Status payloads are
//! dispatched by hand the way a host bridge would forward native events.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use anyhow::Result;
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{ItemKey, LifecycleOptions, LogLevel, MediaEngine, MediaMetadata};
use core_playback::PlaybackCoordinator;
use core_runtime::config::CoreConfig;
use core_runtime::events::EngineEvent;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// ============================================================================
// In-Memory Engine
// ============================================================================

#[derive(Default)]
struct MemoryEngine {
    positions: Mutex<HashMap<ItemKey, Duration>>,
}

#[async_trait]
impl MediaEngine for MemoryEngine {
    async fn prepare_item(
        &self,
        key: ItemKey,
        url: String,
        _options: LifecycleOptions,
    ) -> BridgeResult<MediaMetadata> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.positions.lock().insert(key, Duration::ZERO);
        Ok(MediaMetadata::new()
            .with("duration", 1800.0)
            .with("title", url.rsplit('/').next().unwrap_or_default()))
    }

    async fn activate_item(&self, key: ItemKey, options: LifecycleOptions) -> BridgeResult<MediaMetadata> {
        if let Some(position) = options.position {
            self.positions.lock().insert(key, Duration::from_secs_f64(position));
        }
        Ok(MediaMetadata::new().with("outputRoute", "speaker"))
    }

    async fn deactivate_item(&self, _key: ItemKey, _options: LifecycleOptions) -> BridgeResult<()> {
        Ok(())
    }

    async fn release_item(&self, key: ItemKey, _options: LifecycleOptions) -> BridgeResult<()> {
        self.positions.lock().remove(&key);
        Ok(())
    }

    async fn play(&self, _key: ItemKey) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self, _key: ItemKey) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek(&self, key: ItemKey, position: Duration) -> BridgeResult<Duration> {
        self.positions.lock().insert(key, position);
        Ok(position)
    }

    async fn set_rate(&self, _key: ItemKey, _rate: f64) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_buffer(&self, _key: ItemKey, _duration: Duration) -> BridgeResult<()> {
        Ok(())
    }

    async fn get_position(&self, key: ItemKey) -> BridgeResult<Duration> {
        Ok(self.positions.lock().get(&key).copied().unwrap_or_default())
    }

    async fn get_duration(&self, _key: ItemKey) -> BridgeResult<Duration> {
        Ok(Duration::from_secs(1800))
    }

    async fn get_status(&self, _key: ItemKey) -> BridgeResult<String> {
        Ok("ready".to_string())
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )?;

    let config = CoreConfig::builder()
        .media_engine(Arc::new(MemoryEngine::default()))
        .default_lifecycle_options(LifecycleOptions::default().with_update_interval(500))
        .build()?;
    let coordinator = PlaybackCoordinator::new(config);

    let intro = coordinator.create_item("https://cdn.example.com/show/intro.mp3?sig=secret")?;
    let episode = coordinator.create_item("https://cdn.example.com/show/episode-12.mp3")?;

    let listener = intro.add_listener(|event| {
        info!(status = ?event.status, position = ?event.field("position"), "intro updated");
    });

    let metadata = intro.activate(LifecycleOptions::default()).await?;
    info!(duration = ?metadata.duration(), "intro active");
    intro.play().await?;

    for (status, position) in [("buffering", 0), ("playing", 1), ("playing", 2)] {
        coordinator.dispatch(
            EngineEvent::updated(intro.key().get(), status).with_field("position", position),
        );
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Takes the active slot; the intro is deactivated first.
    episode
        .activate(LifecycleOptions::default().with_position(42.0))
        .await?;
    info!(
        intro = %intro.state(),
        episode = %episode.state(),
        position = ?episode.get_position().await?,
        "handed over"
    );

    intro.remove_listener(listener);
    let (intro_released, episode_released) = tokio::join!(
        intro.release(LifecycleOptions::default()),
        episode.release(LifecycleOptions::default()),
    );
    intro_released?;
    episode_released?;

    info!(active = ?coordinator.active_key(), "all items released");
    Ok(())
}
