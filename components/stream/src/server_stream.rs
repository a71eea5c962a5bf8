use std::sync::Arc;

use bytes::Bytes;
use log::{error, trace, warn};
use parking_lot::{Mutex, MutexGuard};

use codec::{Deframer, Framer, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_MESSAGE_SIZE};
use model::{Metadata, Status};

use crate::error::StreamError;
use crate::listener::ServerStreamListener;
use crate::phase::{Phase, PhaseTracker};
use crate::sink::StreamSink;

/// Outbound surface of a server stream, consumed by the call layer.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait ServerStream: Send + Sync {
    /// Signal demand for up to `n` more inbound messages.
    fn request(&self, n: usize);

    /// Send response headers. Permitted exactly once, before any message.
    fn write_headers(&self, headers: Metadata) -> Result<(), StreamError>;

    /// Frame and buffer one outbound message.
    fn write_message(&self, message: Bytes) -> Result<(), StreamError>;

    /// Push buffered message bytes out to the transport.
    fn flush(&self);

    /// Gracefully close the outbound direction with `status`, carried in the
    /// reserved keys of `trailers`. A second close is a silent no-op at this
    /// layer; the call layer above rejects it explicitly.
    fn close(&self, status: Status, trailers: Metadata);

    /// Whether the transport can accept more data right now.
    fn is_ready(&self) -> bool;
}

/// Per-stream mutable state. Everything touched from both the network and
/// the application thread lives behind one mutex.
struct StreamState {
    phases: PhaseTracker,

    framer: Framer,

    deframer: Deframer,

    listener: Option<Arc<dyn ServerStreamListener>>,

    /// Whether `closed` has been delivered to the listener.
    listener_closed: bool,

    headers_sent: bool,

    /// Whether the stream was closed gracefully by the application, as
    /// opposed to a transport-level failure.
    graceful_close: bool,

    /// Trailers from `close` waiting until the framer has drained every
    /// buffered message byte.
    stashed_trailers: Option<Metadata>,
}

/// Server half of one logical call.
///
/// One instance exists per call. The transport creates it when the call
/// arrives, binds a listener, and feeds it inbound frames from the network
/// thread; the application drives the outbound side concurrently through
/// [`ServerStream`]. Outbound emission is serialized by the internal lock:
/// headers, then message frames, then trailers, in phase order.
pub struct DefaultServerStream<S> {
    sink: S,

    state: Mutex<StreamState>,
}

/// A listener handle plus the status to deliver, resolved under the lock and
/// fired after it is released.
type ClosedNotification = Option<(Arc<dyn ServerStreamListener>, Status)>;

impl<S> DefaultServerStream<S>
where
    S: StreamSink,
{
    pub fn new(sink: S) -> Self {
        Self::with_limits(sink, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_limits(sink: S, chunk_size: usize, max_message_size: usize) -> Self {
        Self {
            sink,
            state: Mutex::new(StreamState {
                phases: PhaseTracker::new(),
                framer: Framer::new(chunk_size, max_message_size),
                deframer: Deframer::new(max_message_size),
                listener: None,
                listener_closed: false,
                headers_sent: false,
                graceful_close: false,
                stashed_trailers: None,
            }),
        }
    }

    /// Bind the listener. Must happen before any inbound frame is processed
    /// and exactly once; a second call is a fail-fast programmer error.
    pub fn set_listener(&self, listener: Arc<dyn ServerStreamListener>) {
        {
            let mut state = self.state.lock();
            assert!(state.listener.is_none(), "Listener is already bound");
            state.listener = Some(Arc::clone(&listener));
        }
        if self.sink.is_ready() {
            listener.ready();
        }
    }

    /// Process the content of an inbound data frame from the network thread.
    ///
    /// Frames arriving after the inbound direction reached its terminal
    /// phase are released unread; cancellation does not stop the peer from
    /// having more frames in flight.
    pub fn inbound_data_received(&self, frame: Bytes, end_of_stream: bool) {
        let mut state = self.state.lock();
        if state.phases.inbound() == Phase::Status {
            trace!(
                "Discarded a {}-byte frame received after inbound close",
                frame.len()
            );
            return;
        }
        state.deframer.deframe(frame, end_of_stream);
        self.drain_inbound(state);
    }

    /// The remote end half-closed without further data.
    pub fn remote_end_closed(&self) {
        let mut state = self.state.lock();
        let fired = Self::half_close_locked(&mut state);
        let listener = state.listener.clone();
        drop(state);

        if fired {
            if let Some(listener) = listener {
                listener.half_closed();
            }
        }
    }

    /// Terminal notification that the outbound side finished successfully.
    ///
    /// A graceful `close` must have happened first; reporting success on a
    /// stream that never closed is a transport bug, so the listener is closed
    /// with an internal status and the violation is returned to the caller.
    pub fn complete(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if !state.graceful_close {
            error!("Stream completed without a preceding graceful close");
            let notification = Self::close_listener_locked(
                &mut state,
                Status::internal("Stream completed without a graceful close"),
            );
            drop(state);
            Self::notify_closed(notification);
            return Err(StreamError::CompleteWithoutClose);
        }

        let notification = Self::close_listener_locked(&mut state, Status::ok());
        drop(state);
        Self::notify_closed(notification);
        Ok(())
    }

    /// Abort the stream with an error status, closing the listener if that
    /// has not happened yet and, when `notify_client` is set, telling the
    /// remote peer.
    ///
    /// This is the one path transports use for internal failures. It is
    /// idempotent for listener notification (the first caller wins) and safe
    /// to invoke concurrently with any other operation.
    pub fn abort_stream(&self, status: Status, notify_client: bool) {
        assert!(!status.is_ok(), "Abort status must not be OK");

        let mut state = self.state.lock();
        let notification = Self::abort_locked(&self.sink, &mut state, status, notify_client);
        drop(state);
        Self::notify_closed(notification);
    }

    /// Whether either side of the stream machinery is done or the listener
    /// has already been told. The two can diverge transiently, hence the
    /// inclusive OR.
    pub fn is_closed(&self) -> bool {
        let state = self.state.lock();
        state.framer.is_closed() || state.listener_closed
    }

    /// Pull every deliverable message out of the deframer, then resolve
    /// half-close or deframe failure. Callbacks fire after the lock is
    /// released.
    fn drain_inbound(&self, mut state: MutexGuard<'_, StreamState>) {
        let mut messages = Vec::new();
        let mut failure = None;
        loop {
            match state.deframer.next() {
                Ok(Some(message)) => {
                    state.phases.advance_inbound(Phase::Message);
                    messages.push(message);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to deframe an inbound message. Cause: {:?}", e);
                    failure = Some(Status::from(&e));
                    break;
                }
            }
        }

        let mut half_closed = false;
        if failure.is_none() && state.deframer.end_of_stream_seen() {
            if state.deframer.is_drained() {
                half_closed = Self::half_close_locked(&mut state);
            } else if !state.deframer.is_stalled() {
                // Bytes remain that can never form a whole message.
                failure = Some(Status::internal(
                    "Reached end of stream in the middle of a message frame",
                ));
            }
        }

        let listener = state.listener.clone();
        let abort =
            failure.map(|status| Self::abort_locked(&self.sink, &mut state, status, true));
        drop(state);

        match listener {
            Some(listener) => {
                for message in messages {
                    listener.message_read(message);
                }
                if half_closed {
                    listener.half_closed();
                }
            }
            None => {
                if !messages.is_empty() {
                    warn!("No listener bound; dropped {} message(s)", messages.len());
                }
            }
        }
        if let Some(notification) = abort {
            Self::notify_closed(notification);
        }
    }

    /// Decide half-close under the lock. The event fires only if the inbound
    /// direction was still open and the listener has not been closed.
    fn half_close_locked(state: &mut MutexGuard<'_, StreamState>) -> bool {
        if state.phases.advance_inbound(Phase::Status) != Phase::Status && !state.listener_closed {
            state.deframer.close();
            true
        } else {
            false
        }
    }

    /// Close the listener with `status`, latching so only the first caller
    /// has any effect, and optionally notify the remote peer.
    fn abort_locked(
        sink: &S,
        state: &mut MutexGuard<'_, StreamState>,
        status: Status,
        notify_client: bool,
    ) -> ClosedNotification {
        let notification = Self::close_listener_locked(state, status.clone());
        if notify_client {
            let mut trailers = state.stashed_trailers.take().unwrap_or_default();
            trailers.set_status(&status);
            sink.send_abort(status, trailers);
        }
        notification
    }

    fn close_listener_locked(
        state: &mut MutexGuard<'_, StreamState>,
        status: Status,
    ) -> ClosedNotification {
        if state.listener_closed {
            return None;
        }
        state.listener_closed = true;
        state.deframer.close();
        state
            .listener
            .clone()
            .map(|listener| (listener, status))
    }

    fn notify_closed(notification: ClosedNotification) {
        if let Some((listener, status)) = notification {
            listener.closed(status);
        }
    }

    /// Emission ordering rule shared by the graceful-close path: a data
    /// frame, if any, goes out before the stashed trailers, and its flush is
    /// suppressed when trailers follow immediately.
    fn send_frame_locked(
        sink: &S,
        state: &mut MutexGuard<'_, StreamState>,
        frame: Option<Bytes>,
        end_of_stream: bool,
        flush: bool,
    ) {
        if let Some(frame) = frame {
            sink.send_frame(frame, false, if end_of_stream { false } else { flush });
        }
        if end_of_stream {
            let trailers = state.stashed_trailers.take().unwrap_or_default();
            sink.send_trailers(trailers, state.headers_sent);
            state.headers_sent = true;
        }
    }
}

impl<S> ServerStream for DefaultServerStream<S>
where
    S: StreamSink,
{
    fn request(&self, n: usize) {
        let mut state = self.state.lock();
        state.deframer.request(n);
        self.drain_inbound(state);
    }

    fn write_headers(&self, headers: Metadata) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        match state.phases.outbound() {
            Phase::Headers => {}
            Phase::Message => return Err(StreamError::HeadersAlreadySent),
            Phase::Status => return Err(StreamError::StreamClosed),
        }
        state.headers_sent = true;
        self.sink.send_headers(headers);
        state.phases.advance_outbound(Phase::Message);
        Ok(())
    }

    fn write_message(&self, message: Bytes) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if state.phases.outbound() != Phase::Message {
            return Err(StreamError::InvalidMessagePhase);
        }

        match state.framer.write_message(message) {
            Ok(chunks) => {
                for chunk in chunks {
                    self.sink.send_frame(chunk, false, false);
                }
                Ok(())
            }
            Err(e) => {
                // The remote peer must still observe a terminal status even
                // though the error propagates to the caller.
                error!("Failed to frame an outbound message. Cause: {:?}", e);
                let status = Status::from(&e);
                let notification = Self::abort_locked(&self.sink, &mut state, status, true);
                drop(state);
                Self::notify_closed(notification);
                Err(StreamError::Frame(e))
            }
        }
    }

    fn flush(&self) {
        let mut state = self.state.lock();
        if let Some(chunk) = state.framer.flush() {
            self.sink.send_frame(chunk, false, true);
        }
    }

    fn close(&self, status: Status, mut trailers: Metadata) {
        let mut state = self.state.lock();
        if state.phases.advance_outbound(Phase::Status) == Phase::Status {
            trace!("Stream is already closed; ignoring duplicate close");
            return;
        }
        state.graceful_close = true;
        trailers.set_status(&status);
        state.stashed_trailers = Some(trailers);

        // Trailers must never precede buffered message bytes; finish the
        // framer first and send its remainder ahead of them.
        let last = state.framer.close();
        Self::send_frame_locked(&self.sink, &mut state, last, true, true);
    }

    fn is_ready(&self) -> bool {
        {
            let state = self.state.lock();
            if state.framer.is_closed() || state.listener_closed {
                return false;
            }
        }
        self.sink.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use bytes::{BufMut, Bytes, BytesMut};
    use model::metadata::{STATUS_CODE_KEY, STATUS_MESSAGE_KEY};
    use model::StatusCode;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum SinkEvent {
        Headers(Metadata),
        Frame {
            frame: Bytes,
            end_of_stream: bool,
            flush: bool,
        },
        Trailers {
            trailers: Metadata,
            headers_sent: bool,
        },
        Abort {
            status: Status,
            trailers: Metadata,
        },
    }

    struct RecordingSink {
        events: Arc<Mutex<Vec<SinkEvent>>>,
        ready: bool,
    }

    impl StreamSink for RecordingSink {
        fn send_headers(&self, headers: Metadata) {
            self.events.lock().push(SinkEvent::Headers(headers));
        }

        fn send_frame(&self, frame: Bytes, end_of_stream: bool, flush: bool) {
            self.events.lock().push(SinkEvent::Frame {
                frame,
                end_of_stream,
                flush,
            });
        }

        fn send_trailers(&self, trailers: Metadata, headers_sent: bool) {
            self.events.lock().push(SinkEvent::Trailers {
                trailers,
                headers_sent,
            });
        }

        fn send_abort(&self, status: Status, trailers: Metadata) {
            self.events.lock().push(SinkEvent::Abort { status, trailers });
        }

        fn is_ready(&self) -> bool {
            self.ready
        }
    }

    #[derive(Default)]
    struct CountingListener {
        ready: AtomicUsize,
        half_closed: AtomicUsize,
        closed: AtomicUsize,
        messages: Mutex<Vec<Bytes>>,
        last_status: Mutex<Option<Status>>,
    }

    impl ServerStreamListener for CountingListener {
        fn ready(&self) {
            self.ready.fetch_add(1, Ordering::SeqCst);
        }

        fn message_read(&self, message: Bytes) {
            self.messages.lock().push(message);
        }

        fn half_closed(&self) {
            self.half_closed.fetch_add(1, Ordering::SeqCst);
        }

        fn closed(&self, status: Status) {
            self.closed.fetch_add(1, Ordering::SeqCst);
            *self.last_status.lock() = Some(status);
        }
    }

    fn stream_with_sink() -> (DefaultServerStream<RecordingSink>, Arc<Mutex<Vec<SinkEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            events: Arc::clone(&events),
            ready: true,
        };
        (DefaultServerStream::new(sink), events)
    }

    fn envelope(payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload);
        buf.freeze()
    }

    fn trailer_code(trailers: &Metadata) -> Option<&str> {
        trailers.get(STATUS_CODE_KEY).and_then(|v| v.as_ascii())
    }

    #[test]
    fn test_headers_message_trailers_in_order() {
        ulog::try_init_log();
        let (stream, events) = stream_with_sink();

        stream.write_headers(Metadata::new()).unwrap();
        stream.write_message(Bytes::from_static(b"1234")).unwrap();
        stream.flush();
        stream.close(Status::ok(), Metadata::new());

        let events = events.lock();
        assert_eq!(3, events.len());
        assert!(matches!(events[0], SinkEvent::Headers(_)));
        match &events[1] {
            SinkEvent::Frame {
                frame,
                end_of_stream,
                flush,
            } => {
                assert_eq!(&envelope(b"1234"), frame);
                assert!(!end_of_stream);
                assert!(flush);
            }
            other => panic!("Expected a data frame, got {:?}", other),
        }
        match &events[2] {
            SinkEvent::Trailers {
                trailers,
                headers_sent,
            } => {
                assert_eq!(Some("0"), trailer_code(trailers));
                assert!(headers_sent);
            }
            other => panic!("Expected trailers, got {:?}", other),
        }
    }

    #[test]
    fn test_trailers_follow_buffered_message_bytes() {
        let (stream, events) = stream_with_sink();

        stream.write_headers(Metadata::new()).unwrap();
        // No flush in between: the message is still sitting in the framer
        // when close runs.
        stream.write_message(Bytes::from_static(b"buffered")).unwrap();
        stream.close(Status::ok(), Metadata::new());

        let events = events.lock();
        assert_eq!(3, events.len());
        match &events[1] {
            SinkEvent::Frame {
                frame,
                end_of_stream,
                flush,
            } => {
                assert_eq!(&envelope(b"buffered"), frame);
                assert!(!end_of_stream);
                // The flush is suppressed because trailers follow at once.
                assert!(!flush);
            }
            other => panic!("Expected a data frame, got {:?}", other),
        }
        assert!(matches!(events[2], SinkEvent::Trailers { .. }));
    }

    #[test]
    fn test_double_close_is_a_no_op() {
        let (stream, events) = stream_with_sink();
        let listener = Arc::new(CountingListener::default());
        stream.set_listener(listener.clone());

        stream.close(Status::cancelled(), Metadata::new());
        stream.close(Status::ok(), Metadata::new());

        let events = events.lock();
        let trailers: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Trailers { trailers, .. } => Some(trailers),
                _ => None,
            })
            .collect();
        assert_eq!(1, trailers.len());
        assert_eq!(Some("1"), trailer_code(trailers[0]));

        // Graceful close alone never notifies the listener; completion or an
        // abort does. A duplicate close must not change that.
        assert_eq!(0, listener.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_trailers_only_when_headers_never_sent() {
        let (stream, events) = stream_with_sink();

        stream.close(Status::cancelled(), Metadata::new());

        let events = events.lock();
        assert_eq!(1, events.len());
        match &events[0] {
            SinkEvent::Trailers {
                trailers,
                headers_sent,
            } => {
                assert!(!headers_sent);
                assert_eq!(Some("1"), trailer_code(trailers));
                assert!(trailers.get(STATUS_MESSAGE_KEY).is_none());
            }
            other => panic!("Expected trailers, got {:?}", other),
        }
    }

    #[test]
    fn test_write_message_requires_message_phase() {
        let (stream, _events) = stream_with_sink();

        assert!(matches!(
            stream.write_message(Bytes::from_static(b"early")),
            Err(StreamError::InvalidMessagePhase)
        ));

        stream.write_headers(Metadata::new()).unwrap();
        stream.close(Status::ok(), Metadata::new());

        assert!(matches!(
            stream.write_message(Bytes::from_static(b"late")),
            Err(StreamError::InvalidMessagePhase)
        ));
    }

    #[test]
    fn test_write_headers_twice_rejected() {
        let (stream, _events) = stream_with_sink();

        stream.write_headers(Metadata::new()).unwrap();
        assert!(matches!(
            stream.write_headers(Metadata::new()),
            Err(StreamError::HeadersAlreadySent)
        ));

        stream.close(Status::ok(), Metadata::new());
        assert!(matches!(
            stream.write_headers(Metadata::new()),
            Err(StreamError::StreamClosed)
        ));
    }

    #[test]
    fn test_complete_without_close_fails_and_closes_listener() {
        let (stream, _events) = stream_with_sink();
        let listener = Arc::new(CountingListener::default());
        stream.set_listener(listener.clone());

        assert!(matches!(
            stream.complete(),
            Err(StreamError::CompleteWithoutClose)
        ));

        assert_eq!(1, listener.closed.load(Ordering::SeqCst));
        let status = listener.last_status.lock().clone().unwrap();
        assert_eq!(StatusCode::Internal, status.code);
    }

    #[test]
    fn test_complete_after_close_reports_ok() {
        let (stream, _events) = stream_with_sink();
        let listener = Arc::new(CountingListener::default());
        stream.set_listener(listener.clone());

        stream.close(Status::ok(), Metadata::new());
        stream.complete().unwrap();

        assert_eq!(1, listener.closed.load(Ordering::SeqCst));
        assert_eq!(
            StatusCode::Ok,
            listener.last_status.lock().clone().unwrap().code
        );
    }

    #[test]
    fn test_abort_is_idempotent_for_listener() {
        let (stream, events) = stream_with_sink();
        let listener = Arc::new(CountingListener::default());
        stream.set_listener(listener.clone());

        stream.abort_stream(Status::internal("boom"), true);
        stream.abort_stream(Status::cancelled(), true);

        assert_eq!(1, listener.closed.load(Ordering::SeqCst));
        let status = listener.last_status.lock().clone().unwrap();
        assert_eq!(StatusCode::Internal, status.code);

        // Both aborts may notify the remote peer; the listener hears only
        // the first.
        let events = events.lock();
        assert!(events
            .iter()
            .all(|e| matches!(e, SinkEvent::Abort { .. })));
        match &events[0] {
            SinkEvent::Abort { status, trailers } => {
                assert_eq!(StatusCode::Internal, status.code);
                assert_eq!(Some("13"), trailer_code(trailers));
            }
            other => panic!("Expected an abort, got {:?}", other),
        }
    }

    #[test]
    fn test_ready_fires_when_sink_writable() {
        let (stream, _events) = stream_with_sink();
        let listener = Arc::new(CountingListener::default());
        stream.set_listener(listener.clone());

        assert_eq!(1, listener.ready.load(Ordering::SeqCst));
    }

    #[test]
    fn test_inbound_messages_delivered_with_demand() {
        let (stream, _events) = stream_with_sink();
        let listener = Arc::new(CountingListener::default());
        stream.set_listener(listener.clone());

        stream.inbound_data_received(envelope(b"first"), false);
        assert!(listener.messages.lock().is_empty());

        stream.request(2);
        assert_eq!(vec![Bytes::from_static(b"first")], *listener.messages.lock());

        stream.inbound_data_received(envelope(b"second"), true);
        assert_eq!(2, listener.messages.lock().len());
        assert_eq!(1, listener.half_closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_frames_after_inbound_close_discarded() {
        let (stream, _events) = stream_with_sink();
        let listener = Arc::new(CountingListener::default());
        stream.set_listener(listener.clone());

        stream.request(10);
        stream.inbound_data_received(envelope(b"last"), true);
        assert_eq!(1, listener.half_closed.load(Ordering::SeqCst));

        stream.inbound_data_received(envelope(b"late"), false);
        assert_eq!(1, listener.messages.lock().len());
        assert_eq!(1, listener.half_closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_deframe_failure_aborts_stream() {
        let (stream, events) = stream_with_sink();
        let listener = Arc::new(CountingListener::default());
        stream.set_listener(listener.clone());

        stream.request(1);
        let mut bad = BytesMut::new();
        bad.put_u8(0x01);
        bad.put_u32(1);
        bad.put_u8(b'x');
        stream.inbound_data_received(bad.freeze(), false);

        assert_eq!(1, listener.closed.load(Ordering::SeqCst));
        let status = listener.last_status.lock().clone().unwrap();
        assert_eq!(StatusCode::Internal, status.code);
        assert!(events
            .lock()
            .iter()
            .any(|e| matches!(e, SinkEvent::Abort { .. })));
    }

    #[test]
    fn test_end_of_stream_mid_message_aborts() {
        let (stream, _events) = stream_with_sink();
        let listener = Arc::new(CountingListener::default());
        stream.set_listener(listener.clone());

        stream.request(1);
        let frame = envelope(b"truncated");
        stream.inbound_data_received(frame.slice(0..4), true);

        assert_eq!(1, listener.closed.load(Ordering::SeqCst));
        assert_eq!(0, listener.half_closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_oversized_outbound_message_aborts_and_propagates() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            events: Arc::clone(&events),
            ready: true,
        };
        let stream = DefaultServerStream::with_limits(sink, 64, 8);
        let listener = Arc::new(CountingListener::default());
        stream.set_listener(listener.clone());

        stream.write_headers(Metadata::new()).unwrap();
        let err = stream
            .write_message(Bytes::from(vec![0u8; 16]))
            .unwrap_err();
        assert!(matches!(err, StreamError::Frame(_)));

        // The caller saw the failure and the peer still got a terminal
        // status.
        assert_eq!(1, listener.closed.load(Ordering::SeqCst));
        assert!(events
            .lock()
            .iter()
            .any(|e| matches!(e, SinkEvent::Abort { .. })));
    }

    #[test]
    fn test_is_closed_after_close_or_abort() {
        let (stream, _events) = stream_with_sink();
        assert!(!stream.is_closed());
        stream.close(Status::ok(), Metadata::new());
        assert!(stream.is_closed());

        let (stream, _events) = stream_with_sink();
        stream.abort_stream(Status::cancelled(), false);
        assert!(stream.is_closed());
    }

    #[test]
    fn test_closed_fires_exactly_once_under_racing_paths() {
        ulog::try_init_log();
        for _ in 0..100 {
            let (stream, _events) = stream_with_sink();
            let listener = Arc::new(CountingListener::default());
            stream.set_listener(listener.clone());
            let stream = Arc::new(stream);

            let aborter = Arc::clone(&stream);
            let closer = Arc::clone(&stream);
            std::thread::scope(|scope| {
                scope.spawn(move || {
                    aborter.abort_stream(Status::cancelled(), false);
                });
                scope.spawn(move || {
                    closer.close(Status::ok(), Metadata::new());
                    let _ = closer.complete();
                });
            });

            assert_eq!(1, listener.closed.load(Ordering::SeqCst));
        }
    }
}
