//! Incremental frame decoder and the running text accumulator.

use super::error::DecodeError;
use super::frame::{FRAME_TERMINATOR, WireFrame};

/// Splits an arbitrarily chunked byte stream into frames.
///
/// Incomplete trailing bytes are kept until the next `push`. After the first
/// error the decoder drops its buffer and refuses further input.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_buffer_size: usize,
    failed: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

    pub fn new() -> Self {
        Self::with_max_buffer_size(Self::DEFAULT_MAX_BUFFER_SIZE)
    }

    pub fn with_max_buffer_size(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_buffer_size,
            failed: false,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Buffers bytes without decoding them.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        if self.failed {
            return Err(DecodeError::Poisoned);
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Pops the next complete frame, `Ok(None)` when more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<WireFrame>, DecodeError> {
        if self.failed {
            return Err(DecodeError::Poisoned);
        }

        let Some(end) = self.buffer.iter().position(|&b| b == FRAME_TERMINATOR) else {
            if self.buffer.len() > self.max_buffer_size {
                return Err(self.fail(DecodeError::BufferOverflow(self.max_buffer_size)));
            }
            return Ok(None);
        };

        let parsed = WireFrame::parse(&self.buffer[..end]);
        self.buffer.drain(..=end);
        parsed.map(Some).map_err(|e| self.fail(e))
    }

    /// Feeds bytes and returns every frame completed by them, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<WireFrame>, DecodeError> {
        self.feed(bytes)?;
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Called once the writer closed the stream normally.
    pub fn finish(&mut self) -> Result<(), DecodeError> {
        if self.failed {
            return Err(DecodeError::Poisoned);
        }
        if !self.buffer.is_empty() {
            let pending = self.buffer.len();
            return Err(self.fail(DecodeError::Unterminated(pending)));
        }
        Ok(())
    }

    fn fail(&mut self, error: DecodeError) -> DecodeError {
        self.failed = true;
        self.buffer.clear();
        error
    }
}

/// Running concatenation of decoded text deltas. Only ever appended to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Accumulator {
    text: String,
    chunks: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the new cumulative text.
    pub fn append(&mut self, chunk: &str) -> &str {
        self.text.push_str(chunk);
        self.chunks += 1;
        &self.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
