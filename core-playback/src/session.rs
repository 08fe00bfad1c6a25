//! # Playback Session
//!
//! Host audio-session toggle. Activation and deactivation are guarded: a
//! session cannot be activated twice or deactivated while inactive.

use crate::coordinator::PlaybackCoordinator;
use crate::error::{PlaybackError, Result};
use bridge_traits::{SessionEngine, SessionKey, SessionOptions};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub struct PlaybackSession {
    key: SessionKey,
    options: SessionOptions,
    engine: Arc<dyn SessionEngine>,
    /// Serializes toggles so the flag and the engine agree.
    toggle: Mutex<()>,
    active: AtomicBool,
}

impl PlaybackSession {
    pub fn new(coordinator: &PlaybackCoordinator, options: SessionOptions) -> Result<Self> {
        let engine = coordinator.config().require_session_engine()?;
        Ok(Self {
            key: coordinator.allocate_session_key(),
            options,
            engine,
            toggle: Mutex::new(()),
            active: AtomicBool::new(false),
        })
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub async fn activate(&self) -> Result<()> {
        let _toggle = self.toggle.lock().await;
        if self.is_active() {
            return Err(PlaybackError::SessionState("is already active"));
        }

        self.engine
            .activate_session(self.key, self.options.clone())
            .await?;
        self.active.store(true, Ordering::Release);
        info!(key = %self.key, category = %self.options.category, "Session activated");
        Ok(())
    }

    pub async fn deactivate(&self) -> Result<()> {
        let _toggle = self.toggle.lock().await;
        if !self.is_active() {
            return Err(PlaybackError::SessionState("is not active"));
        }

        self.engine.deactivate_session(self.key).await?;
        self.active.store(false, Ordering::Release);
        info!(key = %self.key, "Session deactivated");
        Ok(())
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("key", &self.key)
            .field("options", &self.options)
            .field("active", &self.is_active())
            .finish()
    }
}
