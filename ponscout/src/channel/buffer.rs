//! Pattern buffer with tail-only search.
//!
//! Prompt detection only looks at the last N bytes of the accumulated
//! output. A port listing on a full 128-ONU PON runs to tens of kilobytes;
//! the prompt is always in the tail.

use regex::bytes::Regex;

use super::ansi::AnsiStripper;

/// Buffer for accumulating device output and searching its tail.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The accumulated, escape-stripped output.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    stripper: AnsiStripper,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            stripper: AnsiStripper::new(),
        }
    }

    /// Extend the buffer with new data, stripping terminal escapes.
    pub fn extend(&mut self, data: &[u8]) {
        self.stripper.strip_into(data, &mut self.buffer);
    }

    fn tail_start(&self) -> usize {
        self.buffer.len().saturating_sub(self.search_depth)
    }

    /// Search the tail for `pattern`.
    ///
    /// Returns the `(start, end)` byte offsets of the match in the full
    /// buffer.
    pub fn search_tail(&self, pattern: &Regex) -> Option<(usize, usize)> {
        let start = self.tail_start();
        pattern
            .find(&self.buffer[start..])
            .map(|m| (start + m.start(), start + m.end()))
    }

    /// Check if the tail contains a pattern match.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Check the tail for any literal marker.
    pub fn tail_contains_any(&self, markers: &[String]) -> Option<String> {
        let tail = String::from_utf8_lossy(&self.buffer[self.tail_start()..]);
        markers
            .iter()
            .find(|m| tail.contains(m.as_str()))
            .cloned()
    }

    /// Remove the bytes in `start..end`.
    pub fn remove(&mut self, start: usize, end: usize) {
        let end = end.min(self.buffer.len());
        if start < end {
            self.buffer.drain(start..end);
        }
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
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
    fn test_tail_search_offsets_are_absolute() {
        let mut buffer = PatternBuffer::new(20);
        buffer.extend(&[b'x'; 100]);
        buffer.extend(b"\nZXAN#");

        let pattern = Regex::new(r"ZXAN#").unwrap();
        assert_eq!(buffer.search_tail(&pattern), Some((101, 106)));
    }

    #[test]
    fn test_tail_search_not_in_tail() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"ZXAN#");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"ZXAN#").unwrap();
        assert!(buffer.search_tail(&pattern).is_none());
        assert!(!buffer.tail_contains(&pattern));
    }

    #[test]
    fn test_remove_and_markers() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"row\n --More-- ");
        assert_eq!(
            buffer.tail_contains_any(&["--More--".to_string()]),
            Some("--More--".to_string())
        );
        buffer.remove(4, 14);
        assert_eq!(buffer.as_slice(), b"row\n");
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"test data");
        assert_eq!(buffer.take(), b"test data");
        assert!(buffer.is_empty());
    }
}
