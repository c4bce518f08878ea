//! Firmware update orchestration for the inverter web interface.
//!
//! This module drives the two flashing pipelines the device offers over
//! HTTP and reconciles their progress against partial, possibly failing
//! responses.
//!
//! # Protocol Overview
//!
//! Every update starts by storing the image in the device file store
//! (`POST /edit`). The image is then flashed through one of two transports:
//! 1. **Paged** - `GET /fwupdate?step=n` once per page, strictly in order,
//!    starting with the reset step `-1`
//! 2. **Streamed** - one `GET /swd/mem/flash` through the debug probe whose
//!    body grows by one line per written page until the connection closes
//!
//! # Example
//!
//! ```ignore
//! use update::{HttpTransport, Updater};
//!
//! let transport = HttpTransport::new("http://192.168.4.1", Duration::from_secs(10))?;
//! let mut updater = Updater::new(transport);
//! let session = updater.update_paged("stm32_sine.bin", |stage| println!("{}", stage.message()))?;
//! ```

mod config;
mod error;
mod image;
mod paged;
mod progress;
mod session;
mod stream_decoder;
mod streamed;
mod transport;
mod updater;
mod uploader;

// Re-export what the commands use

pub use config::OTA_IMAGE_NAME;
pub use error::{UpdateError, UpdateResult};
pub use image::UpdateImage;
pub use progress::UpdateStage;
pub use session::{SessionStatus, TransportKind, UpdateSession};
pub use transport::HttpTransport;
pub use updater::Updater;
