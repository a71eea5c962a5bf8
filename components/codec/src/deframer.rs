use std::io::Cursor;

use byteorder::ReadBytesExt;
use bytes::{Buf, Bytes, BytesMut};
use log::{trace, warn};

use crate::error::FrameError;
use crate::{FLAG_COMPRESSED, PREFIX_LENGTH};

/// Decodes inbound wire bytes into whole messages, pull-driven.
///
/// The transport appends raw frame data with [`Deframer::deframe`]; the
/// stream pulls complete messages out with [`Deframer::next`]. Delivery is
/// gated by demand: a message is only yielded while the listener has
/// requested more via [`Deframer::request`], so buffered bytes can sit here
/// across calls without overrunning the application.
pub struct Deframer {
    buffer: BytesMut,

    max_message_size: usize,

    /// Number of messages the listener is ready to accept.
    demand: usize,

    end_of_stream: bool,

    closed: bool,
}

impl Deframer {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_message_size,
            demand: 0,
            end_of_stream: false,
            closed: false,
        }
    }

    /// Raise the number of messages that may be delivered.
    pub fn request(&mut self, n: usize) {
        self.demand = self.demand.saturating_add(n);
    }

    /// Append the content of an inbound data frame. Frames arriving after
    /// close are dropped.
    pub fn deframe(&mut self, frame: Bytes, end_of_stream: bool) {
        if self.closed {
            trace!("Dropped a {}-byte frame arriving after close", frame.len());
            return;
        }
        self.buffer.extend_from_slice(&frame);
        if end_of_stream {
            self.end_of_stream = true;
        }
    }

    /// Pull the next whole message, if demand is outstanding and enough bytes
    /// were buffered.
    pub fn next(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.closed || self.demand == 0 {
            return Ok(None);
        }
        match self.check() {
            Ok(payload_length) => {
                self.buffer.advance(PREFIX_LENGTH);
                let payload = self.buffer.split_to(payload_length).freeze();
                self.demand -= 1;
                trace!("Deframed a {}-byte message", payload_length);
                Ok(Some(payload))
            }
            Err(FrameError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Validate the envelope at the head of the buffer and return its payload
    /// length once the whole message is available.
    fn check(&self) -> Result<usize, FrameError> {
        let mut cursor = Cursor::new(&self.buffer[..]);

        let flags = match cursor.read_u8() {
            Ok(flags) => flags,
            Err(_) => return Err(FrameError::Incomplete),
        };
        if flags & FLAG_COMPRESSED == FLAG_COMPRESSED {
            return Err(FrameError::CompressedMessage);
        }
        if flags & !FLAG_COMPRESSED != 0 {
            return Err(FrameError::BadFrame(format!(
                "Unknown envelope flags: {flags:#04x}"
            )));
        }

        let payload_length = match cursor.read_u32::<byteorder::NetworkEndian>() {
            Ok(n) => n as usize,
            Err(_) => return Err(FrameError::Incomplete),
        };
        if payload_length > self.max_message_size {
            warn!(
                "Inbound message length {} exceeds the maximum allowed {}",
                payload_length, self.max_message_size
            );
            return Err(FrameError::TooLongMessage {
                found: payload_length,
                max: self.max_message_size,
            });
        }

        if cursor.remaining() < payload_length {
            trace!(
                "Incoming message length: {}, remaining bytes: {}",
                payload_length,
                cursor.remaining()
            );
            return Err(FrameError::Incomplete);
        }
        Ok(payload_length)
    }

    /// True once the end-of-stream flag was received, whether or not bytes
    /// are still buffered.
    pub fn end_of_stream_seen(&self) -> bool {
        self.end_of_stream
    }

    /// True when every received byte has been consumed.
    pub fn is_drained(&self) -> bool {
        self.buffer.is_empty()
    }

    /// True while delivery is blocked on demand rather than on data.
    pub fn is_stalled(&self) -> bool {
        self.demand == 0
    }

    /// Drop buffered data and stop accepting frames.
    pub fn close(&mut self) {
        if !self.buffer.is_empty() {
            trace!("Discarded {} buffered byte(s) on close", self.buffer.len());
        }
        self.closed = true;
        self.buffer.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
