//! Firmware images and the flash region they are routed to.

use std::path::Path;

use serde::Serialize;

use super::config::{
    is_bootloader_image, is_paged_image, APPLICATION_BASE_ADDRESS, BOOTLOADER_BASE_ADDRESS,
    PAGED_IMAGE_EXTENSION,
};
use super::error::{UpdateError, UpdateResult};

/// A firmware binary stored (or about to be stored) in the device file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateImage {
    /// File name as stored on the device.
    pub name: String,
    /// Image size in bytes.
    pub size: u64,
}

impl UpdateImage {
    /// Describe an image by name and size.
    pub fn new(name: &str, size: u64) -> UpdateResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UpdateError::user_input("no file selected"));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(UpdateError::user_input(format!(
                "file name must not contain a path separator: {}",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            size,
        })
    }

    /// Describe a local image file, reading its name and size from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> UpdateResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UpdateError::user_input("no file selected"))?;

        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(UpdateError::user_input(format!(
                "{} is not a file",
                path.display()
            )));
        }

        Self::new(name, metadata.len())
    }

    /// Path of the stored image as the paged update endpoint expects it.
    pub fn device_path(&self) -> String {
        format!("/{}", self.name)
    }

    /// Reject images the paged transport cannot flash.
    pub fn require_paged_image(&self) -> UpdateResult<()> {
        if is_paged_image(&self.name) {
            Ok(())
        } else {
            Err(UpdateError::user_input(format!(
                "{} is not a {} image",
                self.name, PAGED_IMAGE_EXTENSION
            )))
        }
    }
}

/// Flash region targeted by the streamed transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlashTarget {
    Bootloader,
    Application,
}

impl FlashTarget {
    /// Pick the region from the image's file name.
    pub fn for_image(image: &UpdateImage) -> Self {
        if is_bootloader_image(&image.name) {
            FlashTarget::Bootloader
        } else {
            FlashTarget::Application
        }
    }

    /// Flag understood by the flash endpoint.
    pub fn query_flag(&self) -> &'static str {
        match self {
            FlashTarget::Bootloader => "bootloader",
            FlashTarget::Application => "flash",
        }
    }

    pub fn base_address(&self) -> u32 {
        match self {
            FlashTarget::Bootloader => BOOTLOADER_BASE_ADDRESS,
            FlashTarget::Application => APPLICATION_BASE_ADDRESS,
        }
    }
}

impl std::fmt::Display for FlashTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlashTarget::Bootloader => write!(f, "bootloader @ 0x{:08X}", self.base_address()),
            FlashTarget::Application => write!(f, "application @ 0x{:08X}", self.base_address()),
        }
    }
}
