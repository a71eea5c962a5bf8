use bytes::Bytes;
use model::Status;

/// Callbacks delivered by a server stream to the call layer above it.
///
/// `closed` fires exactly once per stream; `half_closed` and `ready` fire at
/// most once. Callbacks are invoked outside the stream's internal lock, so an
/// implementation may call back into the stream.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait ServerStreamListener: Send + Sync {
    /// The stream became writable for the first time.
    fn ready(&self);

    /// A whole inbound message was decoded.
    fn message_read(&self, message: Bytes);

    /// The remote end finished sending; no more messages will arrive.
    fn half_closed(&self);

    /// Terminal notification carrying the final status of the stream.
    fn closed(&self, status: Status);
}
