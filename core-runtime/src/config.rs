//! # Core Configuration Module
//!
//! Builds the validated `CoreConfig` the orchestration core is constructed
//! from.
//!
//! ## Required Dependencies
//!
//! - `MediaEngine` - single-item lifecycle and playback controls
//!
//! ## Optional Dependencies
//!
//! - `PlayerEngine` - multi-track players (`Player::create` fails without it)
//! - `SessionEngine` - audio session activation
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, EventScope};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .media_engine(Arc::new(MyEngine::new()))
//!     .player_engine(Arc::new(MyEngine::new()))
//!     .listener_debounce(Duration::from_millis(50))
//!     .event_scope(EventScope::ActiveItem)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! The builder fails fast with an actionable message when the media engine
//! is missing or a setting is out of range:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing media engine");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{LifecycleOptions, MediaEngine, PlayerEngine, SessionEngine};
use std::sync::Arc;
use std::time::Duration;

/// Default debounce window applied to item listeners.
pub const DEFAULT_LISTENER_DEBOUNCE: Duration = Duration::from_millis(50);

/// Which payloads an item listener receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventScope {
    /// Payloads whose key equals the item's key.
    #[default]
    Key,
    /// Any item payload, but only while the listening item holds the active
    /// reference. Suits hosts whose engine only ever plays one item and
    /// reports it without a reliable key.
    ActiveItem,
}

/// Core configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Engine for single media items (required)
    pub media_engine: Arc<dyn MediaEngine>,

    /// Engine for multi-track players (optional)
    pub player_engine: Option<Arc<dyn PlayerEngine>>,

    /// Engine for audio session activation (optional)
    pub session_engine: Option<Arc<dyn SessionEngine>>,

    /// Capacity of the native event channel
    pub event_buffer_size: usize,

    /// Debounce window for item listeners; zero delivers every payload
    pub listener_debounce: Duration,

    /// Filtering rule for item listeners
    pub event_scope: EventScope,

    /// Options merged under the per-call options of every lifecycle call
    pub default_lifecycle_options: LifecycleOptions,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media_engine", &"MediaEngine { ... }")
            .field(
                "player_engine",
                &self.player_engine.as_ref().map(|_| "PlayerEngine { ... }"),
            )
            .field(
                "session_engine",
                &self.session_engine.as_ref().map(|_| "SessionEngine { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("listener_debounce", &self.listener_debounce)
            .field("event_scope", &self.event_scope)
            .field("default_lifecycle_options", &self.default_lifecycle_options)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Player engine, or a `CapabilityMissing` error naming it.
    pub fn require_player_engine(&self) -> Result<Arc<dyn PlayerEngine>> {
        self.player_engine
            .clone()
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "PlayerEngine".to_string(),
                message: "No player engine configured. \
                          Call CoreConfigBuilder::player_engine before creating players."
                    .to_string(),
            })
    }

    /// Session engine, or a `CapabilityMissing` error naming it.
    pub fn require_session_engine(&self) -> Result<Arc<dyn SessionEngine>> {
        self.session_engine
            .clone()
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "SessionEngine".to_string(),
                message: "No session engine configured. \
                          Call CoreConfigBuilder::session_engine before creating sessions."
                    .to_string(),
            })
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_engine: Option<Arc<dyn MediaEngine>>,
    player_engine: Option<Arc<dyn PlayerEngine>>,
    session_engine: Option<Arc<dyn SessionEngine>>,
    event_buffer_size: Option<usize>,
    listener_debounce: Option<Duration>,
    event_scope: EventScope,
    default_lifecycle_options: LifecycleOptions,
}

impl CoreConfigBuilder {
    pub fn media_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.media_engine = Some(engine);
        self
    }

    pub fn player_engine(mut self, engine: Arc<dyn PlayerEngine>) -> Self {
        self.player_engine = Some(engine);
        self
    }

    pub fn session_engine(mut self, engine: Arc<dyn SessionEngine>) -> Self {
        self.session_engine = Some(engine);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn listener_debounce(mut self, window: Duration) -> Self {
        self.listener_debounce = Some(window);
        self
    }

    pub fn event_scope(mut self, scope: EventScope) -> Self {
        self.event_scope = scope;
        self
    }

    pub fn default_lifecycle_options(mut self, options: LifecycleOptions) -> Self {
        self.default_lifecycle_options = options;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` if no media engine was provided
    /// - `Config` if the event buffer size is zero
    pub fn build(self) -> Result<CoreConfig> {
        let media_engine = self.media_engine.ok_or_else(|| Error::CapabilityMissing {
            capability: "MediaEngine".to_string(),
            message: "No media engine provided. \
                      Inject the host's native engine adapter via CoreConfigBuilder::media_engine."
                .to_string(),
        })?;

        let event_buffer_size = self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        if event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be greater than zero".to_string(),
            ));
        }

        Ok(CoreConfig {
            media_engine,
            player_engine: self.player_engine,
            session_engine: self.session_engine,
            event_buffer_size,
            listener_debounce: self.listener_debounce.unwrap_or(DEFAULT_LISTENER_DEBOUNCE),
            event_scope: self.event_scope,
            default_lifecycle_options: self.default_lifecycle_options,
        })
    }
}
