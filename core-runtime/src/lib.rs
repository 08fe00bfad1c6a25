//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the orchestration core:
//! - Configuration (`CoreConfig` and its builder)
//! - The native event channel (`EventBus`, `EventStream`)
//! - Logging and tracing setup
//!
//! ## Overview
//!
//! Nothing in this crate knows about lifecycle states. It wires the host's
//! bridge implementations and settings into one validated configuration and
//! carries engine status payloads from the host into the process.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
