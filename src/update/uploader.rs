//! Uploads firmware images to the device file store.

use std::path::Path;

use tracing::info;

use super::error::UpdateResult;
use super::image::UpdateImage;
use super::progress::UpdateStage;
use super::transport::DeviceTransport;

/// Upload a local image file.
///
/// Performs a single multipart POST; a failed upload is returned as-is
/// without retrying.
pub fn upload_image<T, P, F>(transport: &T, path: P, on_progress: F) -> UpdateResult<UpdateImage>
where
    T: DeviceTransport + ?Sized,
    P: AsRef<Path>,
    F: Fn(UpdateStage),
{
    let path = path.as_ref();
    let image = UpdateImage::from_path(path)?;
    let data = std::fs::read(path)?;

    upload_bytes(transport, &image.name, data, on_progress)
}

/// Upload an in-memory image under `name`.
pub fn upload_bytes<T, F>(
    transport: &T,
    name: &str,
    data: Vec<u8>,
    on_progress: F,
) -> UpdateResult<UpdateImage>
where
    T: DeviceTransport + ?Sized,
    F: Fn(UpdateStage),
{
    let image = UpdateImage::new(name, data.len() as u64)?;

    on_progress(UpdateStage::Uploading {
        name: image.name.clone(),
        size: image.size,
    });
    transport.upload(&image.name, data)?;
    info!(name = %image.name, size = image.size, "image stored on device");

    on_progress(UpdateStage::Uploaded {
        name: image.name.clone(),
    });
    Ok(image)
}
