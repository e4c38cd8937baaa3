//! # Line Framer
//!
//! Splits the inbound byte stream into complete telemetry lines.

use bytes::BytesMut;
use tracing::warn;

/// Default upper bound on a partial line kept between reads
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// Buffers byte chunks and yields complete, trimmed, non-empty lines
///
/// Bytes are only decoded once a full line is available, so a multi-byte
/// UTF-8 character split across two reads decodes correctly.
///
/// # Examples
///
/// ```
/// use armlink::protocol::framer::LineFramer;
///
/// let mut framer = LineFramer::new();
/// assert!(framer.feed(b"m:5:200").is_empty());
/// assert_eq!(framer.feed(b":180:40:12\n  \ns:30:45\n"), vec!["m:5:200:180:40:12", "s:30:45"]);
/// ```
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    max_line_length: usize,
    discarding: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            max_line_length,
            discarding: false,
        }
    }

    /// Append a chunk and drain every line it completes
    ///
    /// Whitespace-only lines are dropped. A partial line longer than the
    /// configured maximum is thrown away together with the rest of that line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(newline + 1);
            if self.discarding {
                self.discarding = false;
                continue;
            }

            let text = String::from_utf8_lossy(&raw[..newline]);
            let line = text.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }

        if self.buffer.len() > self.max_line_length {
            warn!(
                "Dropping over-long telemetry line ({} bytes without newline)",
                self.buffer.len()
            );
            self.buffer.clear();
            self.discarding = true;
        }

        lines
    }

    /// Bytes of the incomplete trailing line
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}
