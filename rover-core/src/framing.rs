//! Newline framing for the byte stream transport
//!
//! Bytes are accumulated until `\n`. A line that grows past the buffer is
//! dropped whole, including the rest of it up to the next terminator, so a
//! truncated command is never handed to the parser.

use heapless::Vec;

pub struct LineFramer<const N: usize> {
    buffer: Vec<u8, N>,
    overflowed: bool,
}

impl<const N: usize> Default for LineFramer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LineFramer<N> {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
        }
    }

    /// Forgets any partial line, used when a new client connects
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Feeds a chunk read from the transport and calls `on_line` for every
    /// completed line, without its `\n` or `\r\n` terminator
    pub fn feed(&mut self, bytes: &[u8], mut on_line: impl FnMut(&[u8])) {
        for &byte in bytes {
            if byte != b'\n' {
                if !self.overflowed && self.buffer.push(byte).is_err() {
                    self.overflowed = true;
                    self.buffer.clear();
                }
                continue;
            }

            if self.overflowed {
                warn!("Dropped line longer than {} bytes", N);
            } else {
                let line = self.buffer.strip_suffix(b"\r").unwrap_or(&self.buffer);
                on_line(line);
            }
            self.reset();
        }
    }
}
