//! # Host Bridge Traits
//!
//! Contracts between the orchestration core and the native media engine that
//! actually decodes and plays audio.
//!
//! ## Overview
//!
//! The core never touches codecs, audio routes or output devices. Everything
//! it needs from the host is expressed as an async trait in this crate, keyed
//! by a process-unique identity key allocated on the core side:
//!
//! - [`MediaEngine`](playback::MediaEngine) - prepare/activate/deactivate/release
//!   of single media items plus their playback controls
//! - [`PlayerEngine`](playback::PlayerEngine) - multi-track players
//! - [`SessionEngine`](playback::SessionEngine) - audio session activation
//! - [`LoggerSink`](logging::LoggerSink) - forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform failures into it with an actionable message; the
//! core propagates these unchanged to whoever issued the call.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single engine instance can be
//! shared by every item, player and listener task.
//!
//! ## Example
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::error::Result;
//! use bridge_traits::playback::{ItemKey, LifecycleOptions, MediaEngine, MediaMetadata};
//!
//! struct NativeEngine { /* handle into the platform player */ }
//!
//! #[async_trait]
//! impl MediaEngine for NativeEngine {
//!     async fn prepare_item(
//!         &self,
//!         key: ItemKey,
//!         url: String,
//!         options: LifecycleOptions,
//!     ) -> Result<MediaMetadata> {
//!         // Load the asset and report its duration
//!         todo!()
//!     }
//!     // ...
//! }
//! ```

pub mod error;
pub mod logging;
pub mod playback;

pub use error::BridgeError;

// Re-export commonly used types
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    ItemKey, LifecycleOptions, MediaEngine, MediaMetadata, PlaybackRange, PlayerEngine,
    PlayerKey, PlayerOptions, SessionEngine, SessionKey, SessionOptions,
};
