//! SSE frame decoding
//!
//! Turns decoded text chunks into `(event, data)` frames. A trailing partial
//! line is carried over and prefixed to the next chunk, so frames split across
//! reads decode exactly like frames that arrive whole.

use tracing::trace;

/// One decoded `(event, data)` unit from the wire
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

/// Incremental decoder for one SSE stream
///
/// A frame is committed when a `data:` line is seen; the event name set by the
/// last `event:` line persists until it is reassigned. Not restartable: a new
/// stream needs a new decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Unconsumed text; everything before `cursor` has been decoded
    buffer: String,
    cursor: usize,
    /// Event name applied to the next data line
    current_event: String,
    /// Set once the transport has closed
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of decoded text
    pub fn push(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if self.cursor > 0 {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
        }
        self.buffer.push_str(chunk);
    }

    /// Mark the end of input; a final unterminated line becomes decodable
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Text held back waiting for a line terminator
    pub fn pending(&self) -> &str {
        &self.buffer[self.cursor..]
    }

    /// Decode the next complete frame, if the buffer holds one
    pub fn next_frame(&mut self) -> Option<Frame> {
        while let Some(line) = self.take_line() {
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        None
    }

    /// Lazily decode every frame currently available
    pub fn frames(&mut self) -> impl Iterator<Item = Frame> + '_ {
        std::iter::from_fn(move || self.next_frame())
    }

    fn take_line(&mut self) -> Option<String> {
        let rest = &self.buffer[self.cursor..];
        let line = match rest.find('\n') {
            Some(pos) => {
                self.cursor += pos + 1;
                &rest[..pos]
            }
            None if self.finished && !rest.is_empty() => {
                self.cursor = self.buffer.len();
                rest
            }
            None => return None,
        };
        Some(line.strip_suffix('\r').unwrap_or(line).to_string())
    }

    fn process_line(&mut self, line: &str) -> Option<Frame> {
        // Blank frame terminators and SSE comments (keep-alive heartbeats)
        if line.is_empty() || line.starts_with(':') {
            return None;
        }

        if let Some(name) = field_value(line, "event") {
            self.current_event = name.trim().to_string();
            return None;
        }

        if let Some(data) = field_value(line, "data") {
            return Some(Frame::new(self.current_event.clone(), data.trim()));
        }

        trace!("Ignoring SSE line: {}", line);
        None
    }
}

/// Value of a `field:` line, accepting both `field: value` and `field:value`
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Carry-over for multi-byte UTF-8 sequences split across byte chunks
///
/// Invalid sequences decode to U+FFFD; an incomplete trailing sequence is held
/// until the next chunk arrives.
#[derive(Debug, Default)]
pub struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (plus any held bytes) as forms whole characters
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        // Incomplete sequence at the end: keep it for the next chunk
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }

    /// Flush whatever is held at end of stream
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}
