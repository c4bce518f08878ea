//! Update sessions and the manager that owns the active one.
//!
//! A session is created per update attempt, mutated only by the driver
//! that runs it, and frozen once it reaches `Complete` or `Failed`.

use serde::Serialize;
use tracing::{info, warn};

use super::config::{FWUPDATE_PATH, RESET_STEP};
use super::error::{UpdateError, UpdateResult};
use super::image::UpdateImage;

/// Which driver runs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportKind {
    Paged,
    Streamed,
}

/// Session lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SessionStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Failed)
    }
}

/// State of one update attempt.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSession {
    pub image: UpdateImage,
    pub transport: TransportKind,
    /// Last step whose response was accepted; `-1` until the reset call returns.
    pub current_step: i64,
    /// Page count reported by the device; 0 while unknown.
    pub total_steps: u32,
    /// Response bytes consumed from the flash log.
    pub bytes_seen: u64,
    /// Image bytes the flash log reports as written.
    pub bytes_flashed: u64,
    pub status: SessionStatus,
    /// Failure detail shown to the operator.
    pub failure: Option<String>,
}

impl UpdateSession {
    fn new(image: UpdateImage, transport: TransportKind) -> Self {
        Self {
            image,
            transport,
            current_step: RESET_STEP,
            total_steps: 0,
            bytes_seen: 0,
            bytes_flashed: 0,
            status: SessionStatus::Pending,
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move from `Pending` to `InProgress`. No effect otherwise.
    pub fn start(&mut self) {
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::InProgress;
        }
    }

    /// Accept the response to `step`, which reported `total_steps` pages.
    ///
    /// Steps must arrive in order: the reset step first, then each page
    /// index exactly once.
    pub fn record_step(&mut self, step: i64, total_steps: u32) -> UpdateResult<()> {
        if self.is_terminal() {
            return Ok(());
        }
        let expected = if self.status == SessionStatus::Pending {
            RESET_STEP
        } else {
            self.current_step + 1
        };
        if step != expected {
            return Err(UpdateError::Protocol {
                endpoint: FWUPDATE_PATH.to_string(),
                reason: format!("response for step {} while expecting step {}", step, expected),
            });
        }

        self.start();
        self.current_step = step;
        self.total_steps = total_steps;
        Ok(())
    }

    /// Number of pages confirmed written by the paged transport.
    pub fn steps_completed(&self) -> u64 {
        (self.current_step + 1).max(0) as u64
    }

    /// Account for newly consumed flash log bytes and written pages.
    pub fn record_stream_progress(&mut self, bytes_seen: u64, bytes_flashed: u64) {
        if self.is_terminal() {
            return;
        }
        self.start();
        self.bytes_seen = self.bytes_seen.max(bytes_seen);
        self.bytes_flashed = self.bytes_flashed.max(bytes_flashed);
    }

    /// Mark the session complete. No effect on a terminal session.
    pub fn complete(&mut self) {
        if self.is_terminal() {
            return;
        }
        info!(image = %self.image.name, "update session complete");
        self.status = SessionStatus::Complete;
    }

    /// Mark the session failed and hand the error back to the caller.
    ///
    /// A session that already finished keeps its outcome.
    pub fn fail(&mut self, error: UpdateError) -> UpdateError {
        if !self.is_terminal() {
            warn!(image = %self.image.name, code = error.error_code(), "update session failed: {}", error);
            self.status = SessionStatus::Failed;
            self.failure = Some(error.to_string());
        }
        error
    }
}

/// Owns the single update session.
///
/// Starting a session while another is `Pending` or `InProgress` is
/// rejected; a terminal session is replaced.
#[derive(Debug, Default)]
pub struct SessionManager {
    session: Option<UpdateSession>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session for `image`, discarding a finished one.
    pub fn begin(
        &mut self,
        image: UpdateImage,
        transport: TransportKind,
    ) -> UpdateResult<&mut UpdateSession> {
        self.ensure_idle()?;

        info!(image = %image.name, ?transport, "starting update session");
        Ok(self.session.insert(UpdateSession::new(image, transport)))
    }

    /// The most recent session, active or finished.
    pub fn current(&self) -> Option<&UpdateSession> {
        self.session.as_ref()
    }

    /// Fail with `SessionActive` while a session is still running.
    pub fn ensure_idle(&self) -> UpdateResult<()> {
        match self.session.as_ref().filter(|s| !s.is_terminal()) {
            Some(active) => Err(UpdateError::SessionActive {
                image: active.image.name.clone(),
            }),
            None => Ok(()),
        }
    }
}
