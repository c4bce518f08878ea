//! Commands for uploading and flashing images on the device.
//!
//! The drivers block on HTTP, so each command runs them on
//! `spawn_blocking` and forwards their progress over a channel to the
//! terminal progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, info};

use crate::settings::UpdaterSettings;
use crate::update::{
    HttpTransport, UpdateError, UpdateImage, UpdateResult, UpdateSession, UpdateStage, Updater,
};

/// Terminal progress bar fed with driver stages.
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    pub fn handle(&self, stage: UpdateStage) {
        match &stage {
            UpdateStage::Log { message } => debug!(%message, "device"),
            UpdateStage::Complete => self.bar.finish_with_message(stage.message()),
            UpdateStage::Failed { .. } => self.bar.abandon_with_message(stage.message()),
            _ => {
                if let Some(percent) = stage.percent() {
                    self.bar.set_position(u64::from(percent));
                }
                self.bar.set_message(stage.message());
            }
        }
    }

    /// Remove the bar when the command ended without a terminal stage.
    fn close(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `task` against a fresh `Updater` on the blocking pool while its
/// progress is drawn on the terminal.
async fn run_with_progress<T, F>(settings: &UpdaterSettings, task: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce(&mut Updater<HttpTransport>, &dyn Fn(UpdateStage)) -> UpdateResult<T>
        + Send
        + 'static,
{
    let device_url = settings.device_url.clone();
    let connect_timeout = settings.connect_timeout();

    // Create a channel for progress updates from the blocking thread
    let (tx, rx) = mpsc::channel::<UpdateStage>();

    let progress_task = thread::spawn(move || {
        let display = ProgressDisplay::new();
        while let Ok(stage) = rx.recv() {
            display.handle(stage);
        }
        display.close();
    });

    let result = tokio::task::spawn_blocking(move || {
        let transport = HttpTransport::new(&device_url, connect_timeout)?;
        info!(device = %transport.base_url(), "connecting to device");
        let mut updater = Updater::new(transport);
        task(&mut updater, &|stage| {
            let _ = tx.send(stage);
        })
    })
    .await
    .map_err(|e| format!("Update task panicked: {}", e))?;

    // Wait for progress forwarding to complete
    let _ = progress_task.join();

    result.map_err(report)
}

fn report(e: UpdateError) -> String {
    error!(code = e.error_code(), kind = ?e.kind(), "{}", e);
    e.to_string()
}

/// Store a file on the device without flashing it.
pub async fn upload_file(settings: &UpdaterSettings, path: PathBuf) -> Result<UpdateImage, String> {
    run_with_progress(settings, move |updater, on_progress| {
        updater.upload(&path, on_progress)
    })
    .await
}

/// Upload a `.bin` image and flash it page by page.
pub async fn flash_paged(settings: &UpdaterSettings, path: PathBuf) -> Result<UpdateSession, String> {
    run_with_progress(settings, move |updater, on_progress| {
        updater.update_paged(&path, on_progress).cloned()
    })
    .await
}

/// Upload an image and flash it through the debug probe.
///
/// Names ending in `loader.bin` go to the bootloader region.
pub async fn flash_swd(settings: &UpdaterSettings, path: PathBuf) -> Result<UpdateSession, String> {
    run_with_progress(settings, move |updater, on_progress| {
        updater.flash_streamed(&path, on_progress).cloned()
    })
    .await
}

/// Hard-reset the target through the debug probe.
pub async fn reset_swd(settings: &UpdaterSettings) -> Result<(), String> {
    run_with_progress(settings, |updater, _| updater.hard_reset()).await
}

/// Store `data` on the device under `name`, flashing it when `flash`
/// is set.
pub async fn install_image(
    settings: &UpdaterSettings,
    name: String,
    data: Vec<u8>,
    flash: bool,
) -> Result<Option<UpdateSession>, String> {
    run_with_progress(settings, move |updater, on_progress| {
        updater
            .install_image(&name, data, flash, on_progress)
            .map(|session| session.cloned())
    })
    .await
}
