use alloc::string::String;
use alloc::vec::Vec;

/// Splits a serial byte stream into trimmed, non-empty text lines.
///
/// Both `\r` and `\n` terminate a line, so CR, LF and CRLF endings all frame
/// identically. The callback runs synchronously on the thread calling
/// [`LineFramer::feed`] and must not block.
pub struct LineFramer<F> {
    buffer: Vec<u8>,
    on_line: F,
}

impl<F: FnMut(&str)> LineFramer<F> {
    pub fn new(on_line: F) -> Self {
        Self {
            buffer: Vec::with_capacity(64),
            on_line,
        }
    }

    /// Appends a chunk and emits every line it completes
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            match byte {
                b'\r' | b'\n' => self.flush_line(),
                _ => self.buffer.push(byte),
            }
        }
    }

    /// Drops any unterminated fragment without emitting it
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of buffered bytes waiting for a terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn flush_line(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let text = String::from_utf8_lossy(&self.buffer);
        let line = text.trim();
        if !line.is_empty() {
            (self.on_line)(line);
        }

        self.buffer.clear();
    }
}
