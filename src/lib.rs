//! Workspace facade crate.
//!
//! Re-exports the workspace crates so host applications can depend on
//! `media-lifecycle` alone. The orchestration core (`core-playback`) sits
//! behind the default `playback` feature; hosts that only need the bridge
//! contracts and runtime plumbing can disable it.

pub use bridge_traits as bridge;
pub use core_runtime as runtime;

#[cfg(feature = "playback")]
pub use core_playback as playback;
