// SPDX-License-Identifier: MIT OR Apache-2.0
//! Preview run settings.
//!
//! Stored as RON next to the save being previewed. Every field has a default,
//! so an empty `()` file is valid.

use moonlite::config::{ConfigError, PlayerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current preview settings format version
pub const PREVIEW_FORMAT_VERSION: u32 = 1;

/// Error loading preview settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error
    #[error("Settings parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// File written by a newer version
    #[error("Preview settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },

    /// Embedded player configuration is invalid
    #[error(transparent)]
    Player(#[from] ConfigError),
}

/// A property to report while previewing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedProperty {
    /// `.`-separated path below the scene root
    pub path: String,
    /// Property name
    pub property: String,
}

/// Settings for one preview run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Format version
    pub version: u32,
    /// Simulated host frame rate
    pub frame_rate: f64,
    /// Playback ticks per second
    pub tick_rate: f64,
    /// Wall-clock seconds to simulate
    pub run_seconds: f64,
    /// Playback speed multiplier
    pub speed: f32,
    /// Overrides the authored looping flag
    pub looped: Option<bool>,
    /// Element paths locked before playing
    pub locked: Vec<String>,
    /// Properties reported at every tick
    pub watch: Vec<WatchedProperty>,
    /// Player configuration
    pub player: PlayerConfig,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            version: PREVIEW_FORMAT_VERSION,
            frame_rate: 60.0,
            tick_rate: 60.0,
            run_seconds: 5.0,
            speed: 1.0,
            looped: None,
            locked: Vec::new(),
            watch: Vec::new(),
            player: PlayerConfig::default(),
        }
    }
}

impl PreviewSettings {
    /// Deserialize and check from RON format
    pub fn from_ron(s: &str) -> Result<Self, SettingsError> {
        let settings: PreviewSettings = ron::from_str(s)?;

        if settings.version > PREVIEW_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: PREVIEW_FORMAT_VERSION,
            });
        }
        settings.player.validate()?;

        Ok(settings)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }
}
