//! Server-side stream state machine for one logical call multiplexed over a
//! shared transport connection.
//!
//! The transport delivers inbound frames to [`DefaultServerStream`], which
//! deframes them and forwards decoded messages to the bound
//! [`ServerStreamListener`]; the call layer above drives the outbound side
//! through the [`ServerStream`] trait. Concrete transport bindings implement
//! [`StreamSink`].

pub mod error;
pub mod listener;
pub mod phase;
pub mod server_stream;
pub mod sink;

pub use crate::error::StreamError;
pub use crate::listener::ServerStreamListener;
pub use crate::phase::Phase;
pub use crate::phase::PhaseTracker;
pub use crate::server_stream::DefaultServerStream;
pub use crate::server_stream::ServerStream;
pub use crate::sink::StreamSink;
