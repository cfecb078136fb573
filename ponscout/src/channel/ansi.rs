//! Terminal escape stripping built on `vte`.
//!
//! OLT shells sprinkle cursor movement and colour codes into their output,
//! and ZTE pagers erase `--More--` with backspaces. Feeding the stream
//! through a VT parser and keeping only printable text plus line controls
//! leaves the plain transcript.

use vte::{Parser, Perform};

/// Streaming ANSI/VT stripper. Parser state carries across chunks.
pub struct AnsiStripper {
    parser: Parser,
}

impl AnsiStripper {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Strip escapes from `data`, appending plain text to `out`.
    ///
    /// Backspace removes the previous byte on the current line. Carriage
    /// returns are dropped.
    pub fn strip_into(&mut self, data: &[u8], out: &mut Vec<u8>) {
        let mut sink = Sink { out };
        self.parser.advance(&mut sink, data);
    }
}

impl Default for AnsiStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnsiStripper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiStripper").finish_non_exhaustive()
    }
}

struct Sink<'a> {
    out: &'a mut Vec<u8>,
}

impl Perform for Sink<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | b'\t' => self.out.push(byte),
            0x08 => {
                if self.out.last().is_some_and(|&b| b != b'\n') {
                    self.out.pop();
                }
            }
            _ => {}
        }
    }
}
