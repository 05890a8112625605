//! Output buffer with ANSI stripping and tail-only prompt search.
//!
//! Prompt patterns are only searched for in the last `search_depth` bytes,
//! so long command outputs do not make each read more expensive.

use std::fmt;

use bytes::BytesMut;
use regex::bytes::{Match, Regex};

/// Default number of trailing bytes searched for a prompt.
pub const DEFAULT_SEARCH_DEPTH: usize = 1000;

/// Accumulates session output and searches its tail for patterns.
///
/// Escape sequences are removed as data arrives. The escape parser keeps
/// its state between calls, so a sequence split across two reads is still
/// stripped.
pub struct PatternBuffer {
    buffer: BytesMut,
    parser: vte::Parser,
    search_depth: usize,
}

impl PatternBuffer {
    /// Create a buffer that searches the last `search_depth` bytes.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            parser: vte::Parser::new(),
            search_depth,
        }
    }

    /// Append raw session bytes, dropping escape sequences and control
    /// characters other than newline, carriage return and tab.
    pub fn extend(&mut self, data: &[u8]) {
        let mut printable = Printable {
            out: &mut self.buffer,
        };
        self.parser.advance(&mut printable, data);
    }

    /// Search the last `search_depth` bytes for `pattern`.
    ///
    /// Match offsets are relative to the start of the searched tail.
    pub fn search_tail(&self, pattern: &Regex) -> Option<Match<'_>> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        pattern.find(&self.buffer[start..])
    }

    /// Take the contents and reset the buffer.
    pub fn take(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DEPTH)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}

/// vte performer that keeps printable text only.
struct Printable<'a> {
    out: &'a mut BytesMut,
}

impl vte::Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.extend_from_slice(&[byte]);
        }
    }
}
