// SPDX-License-Identifier: MIT OR Apache-2.0
//! Player configuration.
//!
//! Settings are read from RON and version-checked on load.

use serde::{Deserialize, Serialize};

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Error reading a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// RON parse error
    #[error("Config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// File written by a newer version
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },

    /// A setting is out of range
    #[error("Invalid setting {name}: {reason}")]
    Invalid {
        /// Setting name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Settings shared by every track created with them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Format version
    pub version: u32,
    /// Frame rate assumed when a save does not declare one
    pub default_frame_rate: f32,
    /// Loop wraps walked one by one in a single update; later whole passes are collapsed
    pub max_wraps_per_update: u32,
    /// Treat a walked element whose class does not match the authored class as missing
    pub strict_types: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            default_frame_rate: 60.0,
            max_wraps_per_update: 8,
            strict_types: false,
        }
    }
}

impl PlayerConfig {
    /// Deserialize and validate from RON format
    pub fn from_ron(s: &str) -> Result<Self, ConfigError> {
        let config: PlayerConfig = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check version and ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }
        if !self.default_frame_rate.is_finite() || self.default_frame_rate <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "default_frame_rate",
                reason: format!("must be positive, got {}", self.default_frame_rate),
            });
        }
        if self.max_wraps_per_update == 0 {
            return Err(ConfigError::Invalid {
                name: "max_wraps_per_update",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
