//! Streamed flash driver for the debug-probe transport.
//!
//! A single request starts the flash; the device then appends one line
//! per written page to the still-open response. Completion is signalled
//! by the response ending, not by reaching a computed page count.

use std::io::{ErrorKind, Read};

use tracing::{debug, info};

use super::config::{PAGE_SIZE, STREAM_READ_CHUNK};
use super::error::{UpdateError, UpdateResult};
use super::image::FlashTarget;
use super::progress::UpdateStage;
use super::session::{TransportKind, UpdateSession};
use super::stream_decoder::{FlashLogDecoder, FlashLogEvent};
use super::transport::DeviceTransport;

/// Handlers for the notifications of one streamed flash.
///
/// Every handler is a no-op once the session is terminal.
#[derive(Debug)]
pub struct StreamedFlash {
    target: FlashTarget,
    decoder: FlashLogDecoder,
    bytes_flashed: u64,
}

impl StreamedFlash {
    /// Prepare a flash for `session`; the target region is fixed here.
    pub fn for_session(session: &UpdateSession) -> Self {
        Self {
            target: FlashTarget::for_image(&session.image),
            decoder: FlashLogDecoder::new(),
            bytes_flashed: 0,
        }
    }

    pub fn target(&self) -> FlashTarget {
        self.target
    }

    /// More of the response body arrived.
    ///
    /// # Returns
    /// - `Ok(Some(stage))` with updated progress
    /// - `Ok(None)` if the session already finished
    /// - `Err(DeviceReported)` if the device logged a failure
    pub fn on_data(
        &mut self,
        session: &mut UpdateSession,
        chunk: &[u8],
    ) -> UpdateResult<Option<UpdateStage>> {
        if session.is_terminal() {
            return Ok(None);
        }

        for event in self.decoder.feed(chunk) {
            match event {
                FlashLogEvent::PageWritten { line } => {
                    debug!(%line, "page written");
                    self.bytes_flashed += PAGE_SIZE;
                }
                FlashLogEvent::DeviceError { detail } => {
                    return Err(session.fail(UpdateError::DeviceReported { detail }));
                }
            }
        }

        debug!(
            bytes_seen = self.decoder.bytes_seen(),
            held_back = self.decoder.pending_len(),
            "flash log chunk"
        );
        session.record_stream_progress(self.decoder.bytes_seen(), self.bytes_flashed);
        Ok(Some(UpdateStage::Flashing {
            flashed: self.bytes_flashed,
            total: session.image.size,
        }))
    }

    /// The response ended cleanly.
    ///
    /// A final percentage below 100 is not an error.
    pub fn on_complete(&mut self, session: &mut UpdateSession) -> Option<UpdateStage> {
        if session.is_terminal() {
            return None;
        }
        session.complete();
        Some(UpdateStage::Complete)
    }

    /// The connection failed. Returns the error unchanged.
    pub fn on_transport_error(
        &mut self,
        session: &mut UpdateSession,
        error: UpdateError,
    ) -> UpdateError {
        session.fail(error)
    }
}

/// Run a streamed flash to completion.
pub fn run_streamed_flash<T, F>(
    transport: &T,
    session: &mut UpdateSession,
    on_progress: F,
) -> UpdateResult<()>
where
    T: DeviceTransport + ?Sized,
    F: Fn(UpdateStage),
{
    if session.transport != TransportKind::Streamed {
        return Err(UpdateError::user_input(
            "session was not created for the streamed transport",
        ));
    }
    if session.is_terminal() {
        return Err(UpdateError::user_input(
            "session already finished; start a new update",
        ));
    }

    let mut flash = StreamedFlash::for_session(session);
    info!(image = %session.image.name, target = %flash.target(), "starting streamed flash");
    on_progress(UpdateStage::Log {
        message: format!("Flashing {} to {}", session.image.name, flash.target()),
    });

    session.start();
    let mut body = match transport.open_flash_stream(flash.target(), &session.image.name) {
        Ok(body) => body,
        Err(e) => return Err(flash.on_transport_error(session, e)),
    };

    let mut buffer = [0u8; STREAM_READ_CHUNK];
    loop {
        match body.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                if let Some(stage) = flash.on_data(session, &buffer[..n])? {
                    on_progress(stage);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(flash.on_transport_error(session, e.into())),
        }
    }

    if let Some(stage) = flash.on_complete(session) {
        on_progress(stage);
    }
    Ok(())
}
