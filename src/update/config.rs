//! Configuration constants for the inverter web-interface update protocol.

// ============================================================================
// Device Endpoints
// ============================================================================

/// File store endpoint; accepts a multipart upload and stores it by name.
pub const UPLOAD_PATH: &str = "/edit";

/// Paged update endpoint (`?step=<n>&file=<path>`).
pub const FWUPDATE_PATH: &str = "/fwupdate";

/// Streamed flash endpoint on the debug probe (`?bootloader|flash&file=<name>`).
pub const SWD_FLASH_PATH: &str = "/swd/mem/flash";

/// Debug probe reset endpoint.
pub const SWD_RESET_PATH: &str = "/swd/reset";

/// Multipart field that carries the image bytes.
pub const UPLOAD_FIELD_NAME: &str = "updatefile";

// ============================================================================
// Paged Transport
// ============================================================================

/// Step number of the reset/begin call.
pub const RESET_STEP: i64 = -1;

/// Only images with this extension may be flashed through the paged transport.
pub const PAGED_IMAGE_EXTENSION: &str = ".bin";

// ============================================================================
// Streamed Transport
// ============================================================================

/// Bytes written per reported line of the flash log.
pub const PAGE_SIZE: u64 = 16;

/// Substring the device embeds in the flash log when a write fails.
pub const DEVICE_ERROR_MARKER: &str = "Error";

/// File name suffix that routes an image to the bootloader region.
pub const BOOTLOADER_SUFFIX: &str = "loader.bin";

/// Start of the bootloader region in device flash.
pub const BOOTLOADER_BASE_ADDRESS: u32 = 0x0800_0000;

/// Start of the application region in device flash.
pub const APPLICATION_BASE_ADDRESS: u32 = 0x0800_1000;

/// Read buffer size for the long-lived flash log response.
pub const STREAM_READ_CHUNK: usize = 512;

// ============================================================================
// Release Install
// ============================================================================

/// Name a downloaded release image is stored under on the device.
pub const OTA_IMAGE_NAME: &str = "stm32.bin";

/// Check if a file name selects the bootloader region.
pub fn is_bootloader_image(name: &str) -> bool {
    name.ends_with(BOOTLOADER_SUFFIX)
}

/// Check if a file name may be flashed through the paged transport.
pub fn is_paged_image(name: &str) -> bool {
    name.ends_with(PAGED_IMAGE_EXTENSION)
}
