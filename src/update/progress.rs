//! Progress reporting shared by both update drivers.

use serde::{Deserialize, Serialize};

/// Percentage of `done` out of `total`, rounded and clamped to 100.
///
/// Returns `None` while the total is unknown (zero).
pub fn percent(done: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let scaled = (done as f64 * 100.0 / total as f64).round();
    Some(scaled.clamp(0.0, 100.0) as u8)
}

/// Update progress stages for operator feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "data")]
pub enum UpdateStage {
    /// Sending the image to the device file store.
    Uploading { name: String, size: u64 },
    /// Image stored on the device.
    Uploaded { name: String },
    /// Reset/begin request issued.
    Resetting,
    /// Paged transport: `completed` of `total` pages written.
    Stepping { completed: u64, total: u64 },
    /// Streamed transport: `flashed` of `total` image bytes written.
    Flashing { flashed: u64, total: u64 },
    /// Update finished.
    Complete,
    /// Update stopped; `detail` is shown verbatim.
    Failed { detail: String },
    /// Debug log message.
    Log { message: String },
}

impl UpdateStage {
    /// Percentage for this stage, `None` when it carries no progress.
    pub fn percent(&self) -> Option<u8> {
        match self {
            UpdateStage::Uploading { .. }
            | UpdateStage::Uploaded { .. }
            | UpdateStage::Resetting => Some(0),
            UpdateStage::Stepping { completed, total } => percent(*completed, *total),
            UpdateStage::Flashing { flashed, total } => percent(*flashed, *total),
            UpdateStage::Complete => Some(100),
            UpdateStage::Failed { .. } | UpdateStage::Log { .. } => None,
        }
    }

    /// Get a human-readable message for this stage.
    pub fn message(&self) -> String {
        match self {
            UpdateStage::Uploading { name, size } => {
                format!("Uploading {} ({} bytes)...", name, size)
            }
            UpdateStage::Uploaded { .. } => "Upload complete".into(),
            UpdateStage::Resetting => "Resetting controller...".into(),
            UpdateStage::Stepping { .. } | UpdateStage::Flashing { .. } => match self.percent() {
                Some(p) => format!("{}%", p),
                None => "Waiting for device...".into(),
            },
            UpdateStage::Complete => "Update Done!".into(),
            UpdateStage::Failed { detail } => detail.clone(),
            UpdateStage::Log { message } => message.clone(),
        }
    }
}
