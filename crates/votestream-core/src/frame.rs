//! `EventFrameParser` — incremental Server-Sent-Events line framing.
//!
//! The parser is fed raw body chunks in arrival order. A chunk boundary can
//! fall anywhere, including inside a line or inside a multi-byte UTF-8
//! character, so the incomplete tail of every chunk is carried over and
//! only complete lines are decoded.
//!
//! ```text
//! event: new_vote          ← sets the pending event type
//! data: {"id":2,...}       ← emits Frame { event: "new_vote", data: ... }
//!                          ← blank line ends the frame
//! ```
//!
//! Payloads are returned verbatim; JSON decoding is the caller's job
//! (see [`crate::event::StreamEvent::decode`]).

/// Event type used for `data:` lines that have no preceding `event:` line.
pub const DEFAULT_EVENT: &str = "message";

/// One `(event-type, payload)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Line-buffering state machine: a carry-over buffer plus the pending event type.
#[derive(Debug, Default)]
pub struct EventFrameParser {
    carry: Vec<u8>,
    pending_event: Option<String>,
}

impl EventFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.carry.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.carry[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.carry[start..end]).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.carry.drain(..start);
        frames
    }

    /// Convenience wrapper for already-decoded text.
    pub fn push_str(&mut self, chunk: &str) -> Vec<Frame> {
        self.push(chunk.as_bytes())
    }

    /// Flush a trailing line that was never newline-terminated (end of stream).
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.carry);
        let frame = if rest.is_empty() {
            None
        } else {
            self.process_line(&String::from_utf8_lossy(&rest))
        };
        self.pending_event = None;
        frame
    }

    /// Drop all buffered state, ready for a new connection.
    pub fn reset(&mut self) {
        self.carry.clear();
        self.pending_event = None;
    }

    /// Bytes currently waiting for a line terminator.
    pub fn buffered(&self) -> usize {
        self.carry.len()
    }

    fn process_line(&mut self, line: &str) -> Option<Frame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            self.pending_event = None;
            return None;
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                self.pending_event = Some(value.to_string());
                None
            }
            "data" => {
                let event = self
                    .pending_event
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EVENT.to_string());
                Some(Frame::new(event, value))
            }
            // id:, retry: and unknown fields carry nothing we use
            _ => None,
        }
    }
}
