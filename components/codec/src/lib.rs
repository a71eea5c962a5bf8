pub mod deframer;
pub mod error;
pub mod framer;

pub use crate::deframer::Deframer;
pub use crate::error::FrameError;
pub use crate::framer::Framer;

/// Length of the message envelope prefix: one flags byte followed by a
/// four-byte big-endian payload length.
pub(crate) const PREFIX_LENGTH: usize = 5;

pub(crate) const FLAG_COMPRESSED: u8 = 0x01;

/// Default upper bound on a single message payload, 4MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Default size of outbound wire chunks, 16KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;
