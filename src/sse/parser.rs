//! `text/event-stream` parsing
//!
//! [`LineBuffer`] turns arbitrary byte chunks into lines, and
//! [`parse_sse_event`] turns the lines of one block into an event.

use super::event::{SseBlock, SseEvent, DEFAULT_EVENT_NAME};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use bytes::{Buf, BytesMut};
use tracing::debug;

/// Parse one event block (the lines between two blank lines).
///
/// Returns `None` for blocks with no `data`, `id` or `retry` field.
pub fn parse_sse_event<S: AsRef<str>>(lines: &[S], decode_json: bool) -> Option<SseBlock> {
    if lines.is_empty() {
        return None;
    }

    let mut id: Option<String> = None;
    let mut event_name = DEFAULT_EVENT_NAME.to_string();
    let mut data_lines: Vec<&str> = Vec::new();
    let mut retry: Option<u64> = None;

    for line in lines {
        let line = line.as_ref();
        if line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                event_name = if value.is_empty() {
                    DEFAULT_EVENT_NAME.to_string()
                } else {
                    value.to_string()
                };
            }
            "data" => data_lines.push(value),
            "id" => {
                if !value.contains('\0') {
                    id = Some(value.to_string());
                }
            }
            "retry" => match value.parse::<u64>() {
                Ok(ms) => retry = Some(ms),
                Err(_) => debug!(value, "Ignoring invalid SSE retry value"),
            },
            _ => {}
        }
    }

    let has_data = !data_lines.is_empty();
    if !has_data && retry.is_none() && id.is_none() {
        return None;
    }

    let raw_data = data_lines.join("\n");
    let data = if has_data {
        decode_data(&raw_data, decode_json)
    } else {
        JsonValue::Null
    };

    Some(SseBlock::new(
        SseEvent {
            id,
            event: event_name,
            data,
            retry,
            raw_data,
        },
        has_data,
    ))
}

/// Decode joined `data:` lines, falling back to the raw string
pub fn decode_data(raw: &str, decode_json: bool) -> JsonValue {
    if !decode_json || raw.trim().is_empty() {
        return JsonValue::String(raw.to_string());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

/// Longest unterminated line kept before the stream is failed (1 MiB)
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a byte stream into lines on `\n`, `\r\n` or a lone `\r`
#[derive(Debug)]
pub struct LineBuffer {
    buffer: BytesMut,
    /// Bytes of `buffer` already known to hold no terminator
    scanned: usize,
    /// Last chunk ended in `\r`; a leading `\n` belongs to it
    skip_lf: bool,
    max_size: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_size(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    /// Create an empty buffer capped at [`MAX_LINE_BYTES`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer that fails once a line outgrows `max_size` bytes
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            skip_lf: false,
            max_size,
        }
    }

    /// Feed a chunk, returning every line it completes.
    ///
    /// Fails with [`Error::BufferOverflow`] when the unterminated tail grows
    /// past the cap; the buffer is emptied in that case.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();

        loop {
            if self.skip_lf && !self.buffer.is_empty() {
                if self.buffer[0] == b'\n' {
                    self.buffer.advance(1);
                }
                self.skip_lf = false;
            }

            let Some(offset) = self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r')
            else {
                self.scanned = self.buffer.len();
                break;
            };
            let line = self.buffer.split_to(self.scanned + offset);
            self.scanned = 0;
            let terminator = self.buffer[0];
            self.buffer.advance(1);
            if terminator == b'\r' {
                self.skip_lf = true;
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }

        if self.buffer.len() > self.max_size {
            let size = self.buffer.len();
            self.buffer.clear();
            self.scanned = 0;
            return Err(Error::BufferOverflow {
                size,
                limit: self.max_size,
            });
        }

        Ok(lines)
    }

    /// Take whatever is left once the stream ends
    pub fn finish(&mut self) -> Option<String> {
        self.skip_lf = false;
        self.scanned = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
