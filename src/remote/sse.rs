//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; lines may be split anywhere, including
//! between the CR and LF of a CRLF pair. Only `data` fields carry payload,
//! everything else (comments, `event`, `id`, `retry`) is dropped.
//!
//! A line or event larger than `MAX_EVENT_BYTES` is dropped whole, so the
//! decoder never holds more than one oversized chunk.

use bytes::{Buf, BytesMut};
use tracing::warn;

pub const MAX_EVENT_BYTES: usize = 256 * 1024;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
    /// Prefix of `buf` already known to hold no line terminator
    scanned: usize,
    data: Option<String>,
    skip_lf: bool,
    /// Dropping the rest of an oversized line
    discarding_line: bool,
    /// Current event exceeded the limit and will not be dispatched
    oversized: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event payload it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();

        loop {
            if self.skip_lf && !self.buf.is_empty() {
                if self.buf[0] == b'\n' {
                    self.buf.advance(1);
                }
                self.skip_lf = false;
            }

            let Some(offset) = self.buf[self.scanned..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r')
            else {
                self.scanned = self.buf.len();
                break;
            };

            let line = self.buf.split_to(self.scanned + offset);
            self.scanned = 0;
            let terminator = self.buf[0];
            self.buf.advance(1);
            if terminator == b'\r' {
                self.skip_lf = true;
            }

            if self.discarding_line {
                self.discarding_line = false;
                continue;
            }
            if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }

        if self.buf.len() > MAX_EVENT_BYTES {
            if !self.discarding_line {
                warn!("Dropping server-sent line longer than {} bytes", MAX_EVENT_BYTES);
            }
            self.buf.clear();
            self.scanned = 0;
            self.discarding_line = true;
            self.data = None;
            self.oversized = true;
        }

        events
    }

    /// Bytes held for incomplete lines and events
    #[allow(unused)]
    pub fn buffered(&self) -> usize {
        self.buf.len() + self.data.as_ref().map_or(0, String::len)
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if std::mem::take(&mut self.oversized) {
                return None;
            }
            return self.data.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" && !self.oversized {
            let held = self.data.as_ref().map_or(0, |data| data.len() + 1);
            if held + value.len() > MAX_EVENT_BYTES {
                warn!("Dropping server-sent event larger than {} bytes", MAX_EVENT_BYTES);
                self.data = None;
                self.oversized = true;
                return None;
            }

            match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }

        None
    }
}
