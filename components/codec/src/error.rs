use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    /// Not enough data is available to parse a whole message
    #[error("Not enough data for a message frame")]
    Incomplete,

    #[error("The incoming frame is invalid. Reason: {0}")]
    BadFrame(String),

    #[error("Message length(found: {found:?}, max: {max:?}) exceeds the maximum allowed")]
    TooLongMessage { found: usize, max: usize },

    #[error("Compressed messages are not supported")]
    CompressedMessage,

    #[error("The framer has already been closed")]
    FramerClosed,
}
