//! # Playback Lifecycle Module
//!
//! Drives media items and players through an engine's lifecycle.
//!
//! ## Overview
//!
//! This module handles:
//! - Serialized asynchronous transitions per item (`fsm`)
//! - The item lifecycle protocol and playback controls (`item`)
//! - The process-wide active-item slot and key allocation (`coordinator`)
//! - Debounced delivery of engine status payloads (`listener`)
//! - Forwarding players and audio sessions (`player`, `session`)
//!
//! ## Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use bridge_traits::{LifecycleOptions, MediaEngine};
//! # use core_runtime::config::CoreConfig;
//! # use core_playback::PlaybackCoordinator;
//! # async fn demo(engine: Arc<dyn MediaEngine>) -> core_playback::Result<()> {
//! let config = CoreConfig::builder().media_engine(engine).build()?;
//! let coordinator = PlaybackCoordinator::new(config);
//!
//! let item = coordinator.create_item("https://example.com/episode.mp3")?;
//! item.activate(LifecycleOptions::default()).await?;
//! item.play().await?;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod error;
pub mod fsm;
pub mod item;
pub mod listener;
pub mod player;
pub mod session;

pub use coordinator::PlaybackCoordinator;
pub use error::{PlaybackError, Result};
pub use fsm::{Failure, Pending, StateTable, TransitionQueue};
pub use item::{LifecycleEdge, LifecycleState, PlaybackItem};
pub use listener::ListenerHandle;
pub use player::Player;
pub use session::PlaybackSession;
