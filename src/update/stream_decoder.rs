//! Incremental decoder for the streamed flash log.
//!
//! The debug probe answers a flash request with one long-lived response
//! and appends a line per written page as it goes. The decoder consumes
//! only newly delivered bytes and holds back an unterminated trailing
//! line until its newline arrives.

use super::config::DEVICE_ERROR_MARKER;

/// Something the flash log reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashLogEvent {
    /// One page was written; `line` is the report without its terminator.
    PageWritten { line: String },
    /// The device reported a failure; `detail` is the delivered text.
    DeviceError { detail: String },
}

/// Streaming line decoder for the flash log.
#[derive(Debug, Default)]
pub struct FlashLogDecoder {
    pending: Vec<u8>,
    bytes_seen: u64,
    failed: bool,
}

impl FlashLogDecoder {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(64),
            bytes_seen: 0,
            failed: false,
        }
    }

    /// Feed newly delivered response bytes to the decoder.
    ///
    /// # Returns
    /// One `PageWritten` per line completed by this chunk, or a single
    /// `DeviceError` if the error marker appeared. After an error the
    /// decoder ignores further input.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FlashLogEvent> {
        if self.failed {
            return Vec::new();
        }
        self.bytes_seen += chunk.len() as u64;

        if contains_marker(chunk) {
            self.failed = true;
            self.pending.clear();
            return vec![FlashLogEvent::DeviceError {
                detail: String::from_utf8_lossy(chunk).into_owned(),
            }];
        }

        self.pending.extend_from_slice(chunk);

        // Marker split across two deliveries
        if contains_marker(&self.pending) {
            self.failed = true;
            let detail = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            return vec![FlashLogEvent::DeviceError { detail }];
        }

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..pos]);
            events.push(FlashLogEvent::PageWritten {
                line: text.trim_end_matches('\r').to_string(),
            });
        }

        events
    }

    /// Total response bytes delivered so far, including any held-back fragment.
    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    /// Length of the unterminated trailing line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn contains_marker(data: &[u8]) -> bool {
    let marker = DEVICE_ERROR_MARKER.as_bytes();
    data.windows(marker.len()).any(|w| w == marker)
}
