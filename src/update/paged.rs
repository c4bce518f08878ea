//! Paged update driver.
//!
//! Flashes an image already stored on the device by issuing one
//! `/fwupdate` request per page:
//! 1. Step -1 resets the controller and reports the page count
//! 2. Steps 0..pages-1 each write one page
//!
//! Each request is issued only after the previous response was accepted.

use serde::Deserialize;
use tracing::{debug, info};

use super::config::FWUPDATE_PATH;
use super::error::{UpdateError, UpdateResult};
use super::progress::UpdateStage;
use super::session::{SessionStatus, TransportKind, UpdateSession};
use super::transport::DeviceTransport;

/// Body of every `/fwupdate` response.
#[derive(Debug, Deserialize)]
struct StepReply {
    pages: u32,
}

/// Next step to request for `session`, or `None` once it has finished.
pub fn next_step(session: &UpdateSession) -> Option<i64> {
    match session.status {
        SessionStatus::Pending => Some(super::config::RESET_STEP),
        SessionStatus::InProgress => {
            let next = session.current_step + 1;
            (next < i64::from(session.total_steps)).then_some(next)
        }
        SessionStatus::Complete | SessionStatus::Failed => None,
    }
}

/// Apply the response to `step` to the session.
///
/// Completes the session once the final page index has been answered.
/// Completion is optimistic: the device sends no separate commit signal.
pub fn apply_step_response(
    session: &mut UpdateSession,
    step: i64,
    body: &str,
) -> UpdateResult<UpdateStage> {
    let reply: StepReply = serde_json::from_str(body).map_err(|e| UpdateError::Protocol {
        endpoint: FWUPDATE_PATH.to_string(),
        reason: e.to_string(),
    })?;

    session.record_step(step, reply.pages)?;

    let completed = session.steps_completed();
    let total = u64::from(reply.pages);
    if completed >= total {
        session.complete();
    }

    Ok(UpdateStage::Stepping { completed, total })
}

/// Run a paged update to completion.
///
/// Any transport or protocol failure marks the session failed and stops
/// stepping; there is no retry.
pub fn run_paged_update<T, F>(
    transport: &T,
    session: &mut UpdateSession,
    on_progress: F,
) -> UpdateResult<()>
where
    T: DeviceTransport + ?Sized,
    F: Fn(UpdateStage),
{
    if session.transport != TransportKind::Paged {
        return Err(UpdateError::user_input(
            "session was not created for the paged transport",
        ));
    }
    if session.is_terminal() {
        return Err(UpdateError::user_input(
            "session already finished; start a new update",
        ));
    }
    if let Err(e) = session.image.require_paged_image() {
        return Err(session.fail(e));
    }

    let file = session.image.device_path();
    info!(file = %file, "starting paged update");
    on_progress(UpdateStage::Resetting);

    while let Some(step) = next_step(session) {
        debug!(step, "requesting flash step");
        let body = transport
            .flash_step(step, &file)
            .map_err(|e| session.fail(e))?;

        let stage = apply_step_response(session, step, &body).map_err(|e| session.fail(e))?;
        debug!(step, ?stage, "flash step accepted");
        on_progress(stage);
    }

    on_progress(UpdateStage::Complete);
    Ok(())
}
