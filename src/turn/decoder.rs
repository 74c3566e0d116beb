//! Newline-delimited JSON decoding with carry-over of partial lines
//!
//! Chunks arrive at arbitrary byte boundaries, including inside a line or
//! inside a multi-byte character. Bytes are buffered until a `\n` completes
//! a line; whatever follows the last newline waits for the next chunk.

use crate::turn::event::TurnEvent;

/// Splits a byte stream into complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // only the new bytes can hold a newline; earlier ones were scanned
        let start = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = chunk.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(start + last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(|&b| b == b'\n')
            .filter_map(to_line)
            .collect()
    }

    /// End of stream: the unterminated remainder, if it holds anything
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        to_line(&rest)
    }

    /// Bytes waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn to_line(bytes: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(bytes);
    let line = line.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Parse one frame
pub fn decode_frame(line: &str) -> Result<TurnEvent, serde_json::Error> {
    serde_json::from_str(line)
}

/// Line buffer plus frame parsing; malformed frames are logged and skipped
#[derive(Debug, Default)]
pub struct EventDecoder {
    lines: LineBuffer,
    skipped: usize,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<TurnEvent> {
        let lines = self.lines.push(chunk);
        self.decode_lines(lines)
    }

    pub fn finish(&mut self) -> Vec<TurnEvent> {
        let lines: Vec<String> = self.lines.finish().into_iter().collect();
        self.decode_lines(lines)
    }

    /// Frames that could not be parsed so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode_lines(&mut self, lines: Vec<String>) -> Vec<TurnEvent> {
        let mut events = Vec::with_capacity(lines.len());
        for line in lines {
            match decode_frame(&line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    self.skipped += 1;
                    tracing::warn!("Skipping malformed frame ({}): {}", e, truncate(&line, 120));
                }
            }
        }
        events
    }
}

/// Decode a whole body delivered as `chunks`
pub fn decode_all<I, C>(chunks: I) -> Vec<TurnEvent>
where
    I: IntoIterator<Item = C>,
    C: AsRef<[u8]>,
{
    let mut decoder = EventDecoder::new();
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(decoder.push(chunk.as_ref()));
    }
    events.extend(decoder.finish());
    events
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
