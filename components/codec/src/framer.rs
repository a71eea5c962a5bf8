use bytes::{BufMut, Bytes, BytesMut};
use log::trace;

use crate::error::FrameError;
use crate::PREFIX_LENGTH;

/// Encodes outbound messages into wire chunks.
///
/// Each message is written into an internal buffer behind a five-byte
/// envelope prefix. The buffer is cut into chunks of at most `chunk_size`
/// bytes; a chunk is handed back to the caller as soon as it fills up, the
/// remainder stays buffered until [`Framer::flush`] or [`Framer::close`]
/// drains it. A message may span several chunks and a chunk may carry several
/// small messages.
pub struct Framer {
    buffer: BytesMut,

    chunk_size: usize,

    max_message_size: usize,

    closed: bool,
}

impl Framer {
    pub fn new(chunk_size: usize, max_message_size: usize) -> Self {
        debug_assert!(chunk_size > 0, "Chunk size must be positive");
        Self {
            buffer: BytesMut::new(),
            chunk_size,
            max_message_size,
            closed: false,
        }
    }

    /// Encode `payload` and return every chunk that became complete.
    ///
    /// An oversized payload is rejected without touching the buffer, so the
    /// framer stays usable for the abort path.
    pub fn write_message(&mut self, payload: Bytes) -> Result<Vec<Bytes>, FrameError> {
        if self.closed {
            return Err(FrameError::FramerClosed);
        }

        if payload.len() > self.max_message_size {
            return Err(FrameError::TooLongMessage {
                found: payload.len(),
                max: self.max_message_size,
            });
        }

        self.buffer.reserve(PREFIX_LENGTH + payload.len());
        // Outbound messages are never compressed.
        self.buffer.put_u8(0);
        self.buffer.put_u32(payload.len() as u32);
        self.buffer.put_slice(&payload);

        let mut chunks = Vec::new();
        while self.buffer.len() >= self.chunk_size {
            chunks.push(self.buffer.split_to(self.chunk_size).freeze());
        }
        trace!(
            "Framed a {}-byte message, {} chunk(s) ready, {} byte(s) buffered",
            payload.len(),
            chunks.len(),
            self.buffer.len()
        );
        Ok(chunks)
    }

    /// Drain whatever is buffered, returning it as one final partial chunk.
    pub fn flush(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }

    /// Mark the outbound direction finished and drain the remainder. Further
    /// writes fail with [`FrameError::FramerClosed`].
    pub fn close(&mut self) -> Option<Bytes> {
        self.closed = true;
        self.flush()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
