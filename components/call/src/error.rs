use model::MarshalError;
use stream::StreamError;
use thiserror::Error;

/// Call-level protocol violations, reported synchronously to the caller.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("call is closed")]
    CallClosed,

    #[error("send_headers has already been called")]
    HeadersAlreadySent,

    #[error("send_headers has not been called")]
    HeadersNotSent,

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}
