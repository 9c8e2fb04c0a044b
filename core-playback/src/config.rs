//! # Playback Settings
//!
//! Tunables for a playback session: polling cadence, queue navigation and
//! focus ducking levels.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What `Next()`/`Previous()` do at the ends of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NavigationMode {
    /// Continue at the opposite end.
    Wrap,
    /// Stay on the first/last item.
    #[default]
    NoWrap,
}

/// Playback session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Period of the status timer sampling playback position.
    ///
    /// Default: 1 second.
    #[serde(default = "default_status_interval")]
    pub status_interval: Duration,

    /// Period of the buffering timer sampling download progress.
    ///
    /// Default: 1 second.
    #[serde(default = "default_buffering_interval")]
    pub buffering_interval: Duration,

    /// Queue navigation at the boundaries.
    ///
    /// Default: `NoWrap`.
    #[serde(default)]
    pub navigation: NavigationMode,

    /// Output volume while ducked for a transient focus loss.
    ///
    /// Default: 0.2.
    #[serde(default = "default_duck_volume")]
    pub duck_volume: f32,

    /// Output volume restored when focus comes back.
    ///
    /// Default: 1.0.
    #[serde(default = "default_full_volume")]
    pub full_volume: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            status_interval: default_status_interval(),
            buffering_interval: default_buffering_interval(),
            navigation: NavigationMode::default(),
            duck_volume: default_duck_volume(),
            full_volume: default_full_volume(),
        }
    }
}

impl PlaybackSettings {
    /// Faster polling for UIs with a scrubbing progress bar.
    pub fn responsive() -> Self {
        Self {
            status_interval: Duration::from_millis(250),
            buffering_interval: Duration::from_millis(250),
            ..Default::default()
        }
    }

    pub fn with_navigation(mut self, navigation: NavigationMode) -> Self {
        self.navigation = navigation;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.status_interval.is_zero() {
            return Err(PlaybackError::Config(
                "status_interval must be > 0".to_string(),
            ));
        }

        if self.buffering_interval.is_zero() {
            return Err(PlaybackError::Config(
                "buffering_interval must be > 0".to_string(),
            ));
        }

        for (name, volume) in [
            ("duck_volume", self.duck_volume),
            ("full_volume", self.full_volume),
        ] {
            if !(0.0..=1.0).contains(&volume) {
                return Err(PlaybackError::Config(format!(
                    "{name} must be between 0.0 and 1.0"
                )));
            }
        }

        if self.duck_volume > self.full_volume {
            return Err(PlaybackError::Config(
                "duck_volume cannot exceed full_volume".to_string(),
            ));
        }

        Ok(())
    }
}

// Default value functions for serde

fn default_status_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_buffering_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_duck_volume() -> f32 {
    0.2
}

fn default_full_volume() -> f32 {
    1.0
}
