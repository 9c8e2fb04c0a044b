//! # Session Configuration
//!
//! Dependency wiring for a playback session.
//!
//! ## Overview
//!
//! A [`SessionConfig`] carries the host bridges a session needs, built through
//! [`SessionConfigBuilder`] with fail-fast validation so a misconfigured host
//! finds out at startup rather than on the first `Play()`.
//!
//! ## Required Dependencies
//!
//! - `PlaybackEngine` - the native player the session drives
//!
//! ## Optional Dependencies
//!
//! - `AudioFocusHost` - required only when `enable_audio_focus` is set
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::SessionConfig;
//! use std::sync::Arc;
//!
//! let config = SessionConfig::builder()
//!     .engine(Arc::new(MyEngine::new()))
//!     .focus_host(Arc::new(MyFocusHost::new()))
//!     .enable_audio_focus(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::SessionConfig;
//!
//! // Fails with CapabilityMissing: no engine was injected
//! let config = SessionConfig::builder()
//!     .build()
//!     .expect("Should fail - missing playback engine");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioFocusHost, PlaybackEngine};
use std::sync::Arc;

/// Host bridges and feature switches for one playback session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Native playback engine (required)
    pub engine: Arc<dyn PlaybackEngine>,

    /// Audio focus arbitration (required when audio focus is enabled)
    pub focus_host: Option<Arc<dyn AudioFocusHost>>,

    /// Per-subscriber event buffer
    pub event_buffer_size: usize,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("engine", &"PlaybackEngine { ... }")
            .field(
                "focus_host",
                &self.focus_host.as_ref().map(|_| "AudioFocusHost { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional session behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Request focus before playing and react to focus changes
    /// (requires AudioFocusHost)
    pub enable_audio_focus: bool,

    /// Lower the volume on transient duckable focus loss instead of pausing
    pub enable_ducking: bool,
}

impl Default for FeatureFlags {
    /// Focus handling is opt-in; once enabled, duckable losses duck.
    fn default() -> Self {
        Self {
            enable_audio_focus: false,
            enable_ducking: true,
        }
    }
}

impl SessionConfig {
    /// Creates a new builder for constructing a `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.features.enable_audio_focus && self.focus_host.is_none() {
            return Err(focus_host_missing_error());
        }

        Ok(())
    }

    /// The focus host to use, or `None` when focus handling is disabled.
    pub fn active_focus_host(&self) -> Option<Arc<dyn AudioFocusHost>> {
        if self.features.enable_audio_focus {
            self.focus_host.clone()
        } else {
            None
        }
    }
}

fn engine_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PlaybackEngine".to_string(),
        message: "A PlaybackEngine implementation is required to play media. \
                 Android: wrap ExoPlayer. iOS: wrap AVPlayer. \
                 Desktop: wrap the platform media pipeline."
            .to_string(),
    }
}

fn focus_host_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioFocusHost".to_string(),
        message: "Audio focus is enabled but no AudioFocusHost was provided. \
                 Inject the platform focus manager or disable `enable_audio_focus`."
            .to_string(),
    }
}

/// Builder for [`SessionConfig`].
#[derive(Default)]
pub struct SessionConfigBuilder {
    engine: Option<Arc<dyn PlaybackEngine>>,
    focus_host: Option<Arc<dyn AudioFocusHost>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl SessionConfigBuilder {
    /// Sets the playback engine (required).
    pub fn engine(mut self, engine: Arc<dyn PlaybackEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the audio focus host.
    pub fn focus_host(mut self, host: Arc<dyn AudioFocusHost>) -> Self {
        self.focus_host = Some(host);
        self
    }

    /// Sets the per-subscriber event buffer size (default: 100).
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn enable_audio_focus(mut self, enable: bool) -> Self {
        self.features.enable_audio_focus = enable;
        self
    }

    pub fn enable_ducking(mut self, enable: bool) -> Self {
        self.features.enable_ducking = enable;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` if no engine was set, or audio focus is enabled
    ///   without a focus host
    /// - `Config` if the event buffer size is zero
    pub fn build(self) -> Result<SessionConfig> {
        let engine = self.engine.ok_or_else(engine_missing_error)?;

        let config = SessionConfig {
            engine,
            focus_host: self.focus_host,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
