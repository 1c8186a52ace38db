// SPDX-License-Identifier: GPL-3.0-only

//! User preferences
//!
//! Persisted as a JSON file under the platform config directory. Loading
//! never fails the caller: a missing or unreadable file yields defaults
//! and a warning, the same policy the capture pipeline applies elsewhere
//! (degrade, log, keep running).

use crate::constants::{BitratePreset, ResolutionTier, TIMELAPSE_DEFAULT_INTERVAL_MS};
use crate::filters::FilterType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

const APP_DIR: &str = "capture-core";
const CONFIG_FILE: &str = "config.json";

/// Persisted user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule-of-thirds grid overlay on the preview
    pub grid_overlay: bool,
    /// Photo self-timer delay in seconds (0 disables)
    pub timer_delay_secs: u8,
    /// Preferred capture resolution tier
    pub resolution_tier: ResolutionTier,
    /// Filter selected at startup
    pub default_filter: FilterType,
    /// Pause interval between timelapse pulses, in milliseconds
    pub timelapse_interval_ms: u64,
    /// Mirror the preview horizontally (front-facing lens convention)
    pub mirror_preview: bool,
    /// Video encoder bitrate preset
    pub bitrate_preset: BitratePreset,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_overlay: false,
            timer_delay_secs: 0,
            resolution_tier: ResolutionTier::default(),
            default_filter: FilterType::default(),
            timelapse_interval_ms: TIMELAPSE_DEFAULT_INTERVAL_MS,
            mirror_preview: false,
            bitrate_preset: BitratePreset::default(),
        }
    }
}

impl Config {
    /// Path of the config file, if a config directory exists
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load preferences, falling back to defaults on any failure
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            warn!("No config directory available, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load preferences from an explicit path (tests use a temp dir)
    pub fn load_from(path: &std::path::Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config, using defaults");
                Self::default()
            }
        }
    }

    /// Persist preferences to the default location
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no config directory")
        })?;
        self.save_to(&path)
    }

    /// Persist preferences to an explicit path
    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sensible() {
        let config = Config::default();
        assert!(!config.grid_overlay);
        assert_eq!(config.timer_delay_secs, 0);
        assert_eq!(config.timelapse_interval_ms, TIMELAPSE_DEFAULT_INTERVAL_MS);
        assert_eq!(config.default_filter, FilterType::Standard);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from(std::path::Path::new("/nonexistent/config.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"grid_overlay": true}"#).unwrap();
        assert!(config.grid_overlay);
        assert_eq!(config.bitrate_preset, BitratePreset::Medium);
    }
}
