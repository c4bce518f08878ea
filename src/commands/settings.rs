//! Commands for persisted updater settings.
//!
//! Settings live in `settings.json` under the per-user config directory.

use std::path::Path;

use tracing::info;

use crate::settings::{SettingsManager, UpdaterSettings};

/// Changes requested on the command line; `None` leaves a field as is.
#[derive(Debug, Default, Clone)]
pub struct SettingsUpdate {
    pub device_url: Option<String>,
    pub release_feed_url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

impl SettingsUpdate {
    fn apply(self, settings: UpdaterSettings) -> UpdaterSettings {
        UpdaterSettings {
            device_url: self
                .device_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(settings.device_url),
            release_feed_url: self.release_feed_url.unwrap_or(settings.release_feed_url),
            connect_timeout_secs: self
                .connect_timeout_secs
                .unwrap_or(settings.connect_timeout_secs),
        }
    }
}

/// Get current settings from disk.
///
/// Returns default settings if no settings file exists yet.
pub fn get_settings(config_dir: &Path) -> Result<UpdaterSettings, String> {
    SettingsManager::new(config_dir).load()
}

/// Apply `update` to the stored settings and save them.
pub fn save_settings(config_dir: &Path, update: SettingsUpdate) -> Result<UpdaterSettings, String> {
    let manager = SettingsManager::new(config_dir);
    let settings = update.apply(manager.load()?);

    if settings.connect_timeout_secs == 0 {
        return Err("Connect timeout must be at least one second".into());
    }
    manager.save(&settings)?;

    if settings.has_non_default_settings() {
        info!(path = %manager.settings_path().display(), ?settings, "saved non-default settings");
    }

    Ok(settings)
}
