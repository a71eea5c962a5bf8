use bytes::Bytes;
use model::{Metadata, Status};

/// Capability set a concrete transport binding implements for one stream.
///
/// The stream invokes these while holding its internal lock, which is what
/// serializes outbound emission; implementations must hand the work to the
/// transport without calling back into the stream. Failures inside the
/// transport are reported through `abort_stream` on the owning stream rather
/// than returned here.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait StreamSink: Send + Sync {
    /// Send response headers to the remote peer.
    fn send_headers(&self, headers: Metadata);

    /// Send one chunk of message data.
    ///
    /// `end_of_stream` marks the last data of the stream; `flush` hints that
    /// no more data is arriving soon.
    fn send_frame(&self, frame: Bytes, end_of_stream: bool, flush: bool);

    /// Send trailers, implying end of stream. `headers_sent` tells the
    /// binding whether response headers already went out, covering the
    /// trailers-only path when they never did.
    fn send_trailers(&self, trailers: Metadata, headers_sent: bool);

    /// Notify the remote peer that the stream aborted with `status`.
    fn send_abort(&self, status: Status, trailers: Metadata);

    /// Whether the transport can accept more data without buffering
    /// excessively.
    fn is_ready(&self) -> bool;
}
