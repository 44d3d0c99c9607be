// Settings management and persistence
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::admin::AdminSettings;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write settings to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// How often the playing clip's position is sampled
    pub position_update_interval_ms: u64,
    pub volume: f32, // 0.0-1.0
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            position_update_interval_ms: 500,
            volume: 1.0,
        }
    }
}

impl PlaybackSettings {
    pub fn position_update_interval(&self) -> Duration {
        Duration::from_millis(self.position_update_interval_ms.max(1))
    }
}

/// Main application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub version: i32, // Settings schema version for future migrations
    pub playback: PlaybackSettings,
    pub admin: AdminSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: 1,
            playback: PlaybackSettings::default(),
            admin: AdminSettings::default(),
        }
    }
}

impl AppSettings {
    pub fn settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join(SETTINGS_FILE)
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(app_dir: &Path) -> Result<Self, SettingsError> {
        let path = Self::settings_path(app_dir);

        if !path.exists() {
            info!("No settings file found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        let settings: AppSettings = serde_json::from_str(&content)?;

        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn save(&self, app_dir: &Path) -> Result<(), SettingsError> {
        let path = Self::settings_path(app_dir);
        fs::create_dir_all(app_dir).map_err(|source| SettingsError::Write {
            path: path.clone(),
            source,
        })?;

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|source| SettingsError::Write {
            path: path.clone(),
            source,
        })?;

        debug!("Saved settings to {:?}", path);
        Ok(())
    }
}
