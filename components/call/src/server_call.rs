use log::error;
use model::{Metadata, MethodDescriptor, Status};
use stream::ServerStream;

use crate::error::CallError;

/// Application handle for one server-side RPC.
///
/// Wraps exactly one stream and one method descriptor. All operations run on
/// the application thread; the handle is `&mut self` because the call-level
/// flags (`headers_sent`, `closed`) are not shared with the transport.
pub struct ServerCall<Req, Resp, S> {
    stream: S,

    method: MethodDescriptor<Req, Resp>,

    headers_sent: bool,

    closed: bool,
}

impl<Req, Resp, S> ServerCall<Req, Resp, S>
where
    S: ServerStream,
{
    pub fn new(stream: S, method: MethodDescriptor<Req, Resp>) -> Self {
        Self {
            stream,
            method,
            headers_sent: false,
            closed: false,
        }
    }

    pub fn method(&self) -> &MethodDescriptor<Req, Resp> {
        &self.method
    }

    /// Signal demand for up to `n` more request messages.
    pub fn request(&mut self, n: usize) -> Result<(), CallError> {
        self.ensure_open()?;
        self.stream.request(n);
        Ok(())
    }

    /// Send the response headers. Permitted exactly once, before any
    /// message.
    pub fn send_headers(&mut self, headers: Metadata) -> Result<(), CallError> {
        self.ensure_open()?;
        if self.headers_sent {
            return Err(CallError::HeadersAlreadySent);
        }
        // Mark first: a second attempt is rejected regardless of whether
        // this one reaches the transport.
        self.headers_sent = true;
        self.stream.write_headers(headers)?;
        Ok(())
    }

    /// Serialize and send one response message, then flush.
    ///
    /// If the underlying write fails the stream is closed with an internal
    /// status before the error is returned, so no RPC is left dangling.
    pub fn send_message(&mut self, message: &Resp) -> Result<(), CallError> {
        self.ensure_open()?;
        if !self.headers_sent {
            return Err(CallError::HeadersNotSent);
        }

        let payload = self.method.response_marshaller().marshal(message)?;
        if let Err(e) = self.stream.write_message(payload) {
            error!(
                "Failed to write a response message for {}. Cause: {:?}",
                self.method.full_name(),
                e
            );
            self.closed = true;
            self.stream.close(
                Status::internal("Failed to write a response message"),
                Metadata::new(),
            );
            return Err(e.into());
        }
        self.stream.flush();
        Ok(())
    }

    /// Close the call with a terminal status. Any further operation on this
    /// handle fails with [`CallError::CallClosed`].
    pub fn close(&mut self, status: Status, trailers: Metadata) -> Result<(), CallError> {
        self.ensure_open()?;
        self.closed = true;
        self.stream.close(status, trailers);
        Ok(())
    }

    /// Transport writability, for backpressure-aware applications.
    pub fn is_ready(&self) -> bool {
        self.stream.is_ready()
    }

    fn ensure_open(&self) -> Result<(), CallError> {
        if self.closed {
            Err(CallError::CallClosed)
        } else {
            Ok(())
        }
    }
}
