//! # Playback Error Types
//!
//! Error taxonomy for lifecycle transitions and playback controls.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during lifecycle transitions and playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Transition Errors
    // ========================================================================
    /// The requested edge is not defined for the current state.
    #[error("{edge} is not a valid edge from state {state}")]
    InvalidEdge { state: String, edge: String },

    /// A transition produced a target state the table does not declare.
    #[error("{0} is not a valid state")]
    InvalidState(String),

    /// The item was already released; the caller holds a stale reference.
    #[error("PlaybackItem is already released")]
    Released,

    /// The transition queue's worker has stopped.
    #[error("Transition queue closed")]
    QueueClosed,

    // ========================================================================
    // Control Errors
    // ========================================================================
    /// A playback control was invoked in a state that does not allow it.
    #[error("Invalid action for PlaybackItem state: {state} ({action})")]
    Precondition { action: &'static str, state: String },

    /// An argument failed validation before reaching the engine.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Session activated twice or deactivated while inactive.
    #[error("PlaybackSession {0}")]
    SessionState(&'static str),

    // ========================================================================
    // Coordination Errors
    // ========================================================================
    /// The active-item coordinator was not in the state a transition expected.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// A player or session was requested without a matching engine.
    #[error("Capability missing: {0}")]
    CapabilityMissing(String),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The engine rejected the call.
    #[error("Engine call failed: {0}")]
    Engine(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if reissuing the same call may succeed.
    ///
    /// Only engine failures qualify: a failed transition leaves the item in
    /// its origin state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlaybackError::Engine(_))
    }

    /// Returns `true` if the error signals misuse of the API rather than a
    /// runtime failure.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidEdge { .. }
                | PlaybackError::InvalidState(_)
                | PlaybackError::Released
                | PlaybackError::Precondition { .. }
                | PlaybackError::InvariantViolation(_)
        )
    }
}

impl From<core_runtime::Error> for PlaybackError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::CapabilityMissing { capability, message } => {
                PlaybackError::CapabilityMissing(format!("{capability} - {message}"))
            }
            core_runtime::Error::Config(message) => PlaybackError::InvalidArgument(message),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
