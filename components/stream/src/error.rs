use codec::error::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Headers have already been written")]
    HeadersAlreadySent,

    #[error("The stream is closed")]
    StreamClosed,

    #[error("Messages are only permitted after headers and before close")]
    InvalidMessagePhase,

    #[error("Stream completed without a graceful close")]
    CompleteWithoutClose,

    #[error(transparent)]
    Frame(#[from] FrameError),
}
