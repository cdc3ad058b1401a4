//! Session read buffer.
//!
//! Everything read from the device accumulates here until a successful
//! pattern wait (or an explicit clear) drains it. Patterns are matched
//! against the whole accumulated text, not line by line, because a
//! multi-line banner can precede the prompt.

use bytes::{Buf, BytesMut};
use log::warn;
use regex::bytes::Regex;

/// Accumulating, size-bounded buffer of device output.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The accumulated output since the last drain.
    buffer: BytesMut,

    /// Maximum number of bytes retained. The oldest bytes are dropped
    /// beyond this, which only happens when a wait never matches.
    limit: usize,
}

impl PatternBuffer {
    /// Create a new buffer holding at most `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096.min(limit)),
            limit,
        }
    }

    /// Append new data.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() > self.limit {
            let excess = self.buffer.len() - self.limit;
            // Resume at a line start when one follows the cut.
            let cut = memchr::memchr(b'\n', &self.buffer[excess..])
                .map_or(excess, |pos| excess + pos + 1);
            warn!("read buffer over {} bytes, dropping {} oldest", self.limit, cut);
            self.buffer.advance(cut);
        }
    }

    /// Byte offset where the first match of `pattern` ends.
    pub fn find_end(&self, pattern: &Regex) -> Option<usize> {
        pattern.find(&self.buffer).map(|m| m.end())
    }

    /// Drain everything up to `end`, leaving the remainder buffered.
    pub fn split_to(&mut self, end: usize) -> String {
        let head = self.buffer.split_to(end.min(self.buffer.len()));
        String::from_utf8_lossy(&head).into_owned()
    }

    /// Drain the whole buffer.
    pub fn take(&mut self) -> String {
        let all = self.buffer.split();
        String::from_utf8_lossy(&all).into_owned()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard the contents.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_slice(), b"Hello, world!");
    }

    #[test]
    fn test_match_spans_whole_buffer() {
        let mut buffer = PatternBuffer::default();
        buffer.extend(b"Welcome to the lab\r\n");
        buffer.extend(b"Authorized access only\r\n");
        buffer.extend(b"router#");

        let pattern = Regex::new(r"(?s)Welcome.*router#\s*$").unwrap();
        assert_eq!(buffer.find_end(&pattern), Some(buffer.len()));
    }

    #[test]
    fn test_split_keeps_remainder() {
        let mut buffer = PatternBuffer::default();
        buffer.extend(b"show clock\r\n12:00\r\nrouter#");
        let echo = Regex::new(r"show clock").unwrap();
        let end = buffer.find_end(&echo).unwrap();
        assert_eq!(buffer.split_to(end), "show clock");
        assert_eq!(buffer.as_str_lossy(), "\r\n12:00\r\nrouter#");
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(&[b'x'; 8]);
        buffer.extend(b"router#");
        assert_eq!(buffer.len(), 10);
        assert!(buffer.as_slice().ends_with(b"router#"));
    }

    #[test]
    fn test_limit_resumes_at_line_start() {
        let mut buffer = PatternBuffer::new(12);
        buffer.extend(b"aaaa\r\nbbbb\r\nrouter#");
        assert_eq!(buffer.as_str_lossy(), "router#");
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"test data");
        assert_eq!(buffer.take(), "test data");
        assert!(buffer.is_empty());
    }
}
