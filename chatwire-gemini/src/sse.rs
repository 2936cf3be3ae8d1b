//! `data:`-framed event stream decoding.
//!
//! Malformed lines are dropped rather than surfaced: one bad event must not
//! end an otherwise healthy stream.

use bytes::BytesMut;
use serde_json::Value;

use crate::response::GenerateContentResponse;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Parses one line of the event stream into a chunk.
///
/// Returns `None` for non-data lines, the `[DONE]` sentinel, empty payloads
/// and payloads that are not valid chunk JSON.
pub fn parse_event_line(line: &str) -> Option<GenerateContentResponse> {
    let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }

    match serde_json::from_str::<Value>(payload).and_then(|value| {
        serde_json::from_value::<GenerateContentResponse>(unwrap_envelope(value))
    }) {
        Ok(chunk) => Some(chunk),
        Err(err) => {
            tracing::debug!(error = %err, "skipping malformed event line");
            None
        }
    }
}

/// Parses a complete buffered response body.
pub fn parse_response_body(body: &str) -> Result<GenerateContentResponse, serde_json::Error> {
    let value = serde_json::from_str::<Value>(body)?;
    serde_json::from_value(unwrap_envelope(value))
}

/// Some gateways wrap the chunk as `{"response": {...}}`.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if !map.contains_key("candidates") => {
            match map.remove("response") {
                Some(inner @ Value::Object(_)) => inner,
                Some(other) => {
                    map.insert("response".to_string(), other);
                    Value::Object(map)
                }
                None => Value::Object(map),
            }
        }
        other => other,
    }
}

/// Splits an arbitrary sequence of byte reads into complete lines.
///
/// Lines are cut on raw `\n` bytes before decoding, so a multi-byte
/// character split across two reads is reassembled intact.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: BytesMut,
    // Bytes of `buffer` already known to hold no newline.
    scanned: usize,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a read and returns the chunks of every line it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<GenerateContentResponse> {
        self.buffer.extend_from_slice(bytes);
        let mut chunks = Vec::new();

        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let line = self.buffer.split_to(self.scanned + offset + 1);
            self.scanned = 0;
            let line = String::from_utf8_lossy(&line);
            if let Some(chunk) = parse_event_line(&line) {
                chunks.push(chunk);
            }
        }
        self.scanned = self.buffer.len();

        chunks
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Parses whatever is left once the stream has ended.
    pub fn finish(mut self) -> Option<GenerateContentResponse> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        parse_event_line(&String::from_utf8_lossy(&rest))
    }
}
