//! Upload-then-flash orchestration over one device transport.
//!
//! `Updater` owns the session manager, so every update goes through
//! `&mut self` and at most one session can run at a time.

use std::path::Path;

use tracing::info;

use super::error::{UpdateError, UpdateResult};
use super::image::UpdateImage;
use super::paged::run_paged_update;
use super::progress::UpdateStage;
use super::session::{SessionManager, TransportKind, UpdateSession};
use super::streamed::run_streamed_flash;
use super::transport::DeviceTransport;
use super::uploader::{upload_bytes, upload_image};

pub struct Updater<T: DeviceTransport> {
    transport: T,
    sessions: SessionManager,
}

impl<T: DeviceTransport> Updater<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            sessions: SessionManager::new(),
        }
    }

    /// Store a file on the device without flashing it.
    pub fn upload<P, F>(&self, path: P, on_progress: F) -> UpdateResult<UpdateImage>
    where
        P: AsRef<Path>,
        F: Fn(UpdateStage),
    {
        upload_image(&self.transport, path, on_progress)
    }

    /// Upload `path` and flash it through the paged transport.
    ///
    /// Non-`.bin` files are rejected before anything is sent.
    pub fn update_paged<P, F>(&mut self, path: P, on_progress: F) -> UpdateResult<&UpdateSession>
    where
        P: AsRef<Path>,
        F: Fn(UpdateStage),
    {
        let path = path.as_ref();
        UpdateImage::from_path(path)?.require_paged_image()?;
        self.sessions.ensure_idle()?;

        let image = upload_image(&self.transport, path, &on_progress)?;
        self.flash(image, TransportKind::Paged, on_progress)
    }

    /// Upload `path` and flash it through the debug probe.
    pub fn flash_streamed<P, F>(&mut self, path: P, on_progress: F) -> UpdateResult<&UpdateSession>
    where
        P: AsRef<Path>,
        F: Fn(UpdateStage),
    {
        let path = path.as_ref();
        UpdateImage::from_path(path)?;
        self.sessions.ensure_idle()?;

        let image = upload_image(&self.transport, path, &on_progress)?;
        self.flash(image, TransportKind::Streamed, on_progress)
    }

    /// Store an in-memory image under `name`, then run the paged update
    /// when `flash` is set.
    pub fn install_image<F>(
        &mut self,
        name: &str,
        data: Vec<u8>,
        flash: bool,
        on_progress: F,
    ) -> UpdateResult<Option<&UpdateSession>>
    where
        F: Fn(UpdateStage),
    {
        if flash {
            UpdateImage::new(name, data.len() as u64)?.require_paged_image()?;
            self.sessions.ensure_idle()?;
        }

        let image = upload_bytes(&self.transport, name, data, &on_progress)?;
        if !flash {
            info!(name = %image.name, "image stored, flashing skipped");
            return Ok(None);
        }
        self.flash(image, TransportKind::Paged, on_progress).map(Some)
    }

    /// Hard-reset the target through the debug probe.
    pub fn hard_reset(&self) -> UpdateResult<()> {
        info!("requesting hard reset");
        self.transport.hard_reset()
    }

    /// The most recent session.
    pub fn session(&self) -> Option<&UpdateSession> {
        self.sessions.current()
    }

    fn flash<F>(
        &mut self,
        image: UpdateImage,
        transport: TransportKind,
        on_progress: F,
    ) -> UpdateResult<&UpdateSession>
    where
        F: Fn(UpdateStage),
    {
        let session = self.sessions.begin(image, transport)?;
        let result = match transport {
            TransportKind::Paged => run_paged_update(&self.transport, session, &on_progress),
            TransportKind::Streamed => run_streamed_flash(&self.transport, session, &on_progress),
        };

        if let Err(e) = &result {
            on_progress(UpdateStage::Failed {
                detail: e.to_string(),
            });
        }
        result?;

        self.session()
            .ok_or_else(|| UpdateError::user_input("no update session"))
    }
}
