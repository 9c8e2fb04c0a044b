//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the playback session core:
//! - Logging and tracing initialisation with host log forwarding
//! - Session dependency configuration with fail-fast validation
//! - Event bus for session notifications
//!
//! ## Overview
//!
//! `core-playback` depends on this crate for everything that is not playback
//! logic proper: how notifications reach observers, how bridges are wired
//! together, and how logs leave the process.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
