//! Updater settings with persistence.
//!
//! This module provides:
//! - `UpdaterSettings` struct for device and release feed configuration
//! - Persistence to a JSON file in the user config directory
//!
//! Every field carries `#[serde(default)]` so files written by older
//! versions keep loading.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Address the inverter web interface answers on in access-point mode.
pub const DEFAULT_DEVICE_URL: &str = "http://192.168.4.1";

/// Release listing for the stm32-sine firmware.
pub const DEFAULT_RELEASE_FEED_URL: &str =
    "https://api.github.com/repos/jsphuebner/stm32-sine/releases";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Settings file name stored in the config directory.
const SETTINGS_FILENAME: &str = "settings.json";

/// Persisted updater configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdaterSettings {
    /// Base URL of the device web interface.
    #[serde(default = "default_device_url")]
    pub device_url: String,

    /// Release feed listing downloadable firmware.
    #[serde(default = "default_release_feed_url")]
    pub release_feed_url: String,

    /// Time allowed to establish a connection. Requests themselves are
    /// not time-limited: a flash can legitimately run for minutes.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_device_url() -> String {
    DEFAULT_DEVICE_URL.to_string()
}

fn default_release_feed_url() -> String {
    DEFAULT_RELEASE_FEED_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            device_url: default_device_url(),
            release_feed_url: default_release_feed_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl UpdaterSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Apply a per-invocation device override.
    pub fn with_device_url(mut self, device_url: Option<&str>) -> Self {
        if let Some(url) = device_url {
            self.device_url = url.trim_end_matches('/').to_string();
        }
        self
    }

    /// Check if these settings differ from defaults.
    pub fn has_non_default_settings(&self) -> bool {
        *self != Self::default()
    }
}

/// Manages persistence of updater settings to JSON file.
pub struct SettingsManager {
    settings_file_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager for the given config directory.
    pub fn new(config_dir: &Path) -> Self {
        let settings_file_path = config_dir.join(SETTINGS_FILENAME);
        Self { settings_file_path }
    }

    /// Load settings from disk, returning defaults if file doesn't exist.
    pub fn load(&self) -> Result<UpdaterSettings, String> {
        if !self.settings_file_path.exists() {
            return Ok(UpdaterSettings::default());
        }

        let contents = fs::read_to_string(&self.settings_file_path)
            .map_err(|e| format!("Failed to read settings file: {}", e))?;

        // Handle empty file gracefully
        if contents.trim().is_empty() {
            return Ok(UpdaterSettings::default());
        }

        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse settings JSON: {}", e))
    }

    /// Save settings to disk.
    pub fn save(&self, settings: &UpdaterSettings) -> Result<(), String> {
        // Ensure parent directory exists
        if let Some(parent) = self.settings_file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let contents = serde_json::to_string_pretty(settings)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        fs::write(&self.settings_file_path, contents)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }

    /// Get the path where settings are stored.
    pub fn settings_path(&self) -> &Path {
        &self.settings_file_path
    }
}
