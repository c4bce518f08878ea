//! Command handlers behind the CLI subcommands.
//!
//! Handlers return `Result<_, String>` with a message ready for the
//! operator; `main` decides how to print it.

pub mod cache;
pub mod release;
pub mod settings;
pub mod update;

use std::path::PathBuf;

use crate::settings::{SettingsManager, UpdaterSettings};

const APP_DIR_NAME: &str = "inverter-updater";

/// Per-user directories holding settings and downloaded releases.
#[derive(Debug, Clone)]
pub struct AppDirs {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppDirs {
    pub fn locate() -> Result<Self, String> {
        let config_dir = dirs::config_dir()
            .ok_or("Failed to determine config directory")?
            .join(APP_DIR_NAME);
        let cache_dir = dirs::cache_dir()
            .ok_or("Failed to determine cache directory")?
            .join(APP_DIR_NAME);

        Ok(Self {
            config_dir,
            cache_dir,
        })
    }

    /// Load persisted settings, applying the `--device` override.
    pub fn load_settings(&self, device_url: Option<&str>) -> Result<UpdaterSettings, String> {
        let settings = SettingsManager::new(&self.config_dir).load()?;
        Ok(settings.with_device_url(device_url))
    }
}
