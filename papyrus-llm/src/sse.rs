//! Buffered decoder for the provider's server-sent event stream
//!
//! Network chunks do not respect event boundaries, and a multi-byte UTF-8
//! character can be split between two chunks. The decoder buffers both cases
//! and only yields complete `data:` payloads.

/// Payload of one decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    /// A JSON payload
    Json(String),
    /// The `[DONE]` terminator
    Done,
}

/// Incremental SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    pending_bytes: Vec<u8>,
}

impl SseDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every event completed by them
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.pending_bytes.extend_from_slice(chunk);
        let valid_up_to = match std::str::from_utf8(&self.pending_bytes) {
            Ok(_) => self.pending_bytes.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            // Invalid sequence rather than a truncated one: decode lossily.
            Err(_) => {
                let lossy = String::from_utf8_lossy(&self.pending_bytes).into_owned();
                self.pending_bytes.clear();
                self.buffer.push_str(&lossy);
                return self.drain_events();
            },
        };

        let rest = self.pending_bytes.split_off(valid_up_to);
        let complete = std::mem::replace(&mut self.pending_bytes, rest);
        // from_utf8 succeeded on this prefix above.
        self.buffer
            .push_str(std::str::from_utf8(&complete).unwrap_or_default());

        self.drain_events()
    }

    /// Flush a trailing event that was not followed by a blank line
    pub fn finish(&mut self) -> Vec<SseData> {
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return Vec::new();
        }
        self.buffer.push_str("\n\n");
        self.drain_events()
    }

    fn drain_events(&mut self) -> Vec<SseData> {
        let mut events = Vec::new();

        while let Some((end, delimiter_len)) = self.find_boundary() {
            let raw: String = self.buffer.drain(..end).collect();
            self.buffer.drain(..delimiter_len);

            if let Some(event) = Self::parse_event(&raw) {
                events.push(event);
            }
        }

        events
    }

    fn find_boundary(&self) -> Option<(usize, usize)> {
        let lf = self.buffer.find("\n\n").map(|i| (i, 2));
        let crlf = self.buffer.find("\r\n\r\n").map(|i| (i, 4));
        match (lf, crlf) {
            (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
            (a, b) => a.or(b),
        }
    }

    fn parse_event(raw: &str) -> Option<SseData> {
        let data: Vec<&str> = raw
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|d| d.strip_prefix(' ').unwrap_or(d))
            .collect();

        if data.is_empty() {
            return None;
        }

        let payload = data.join("\n");
        if payload.trim() == "[DONE]" {
            Some(SseData::Done)
        } else {
            Some(SseData::Json(payload))
        }
    }
}
