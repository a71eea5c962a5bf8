//! Application-facing call handle, one per RPC.
//!
//! [`ServerCall`] sits above the stream/listener pair and enforces the
//! call-level protocol: headers exactly once and before any message, nothing
//! after close. Validated operations are forwarded to the bound
//! [`stream::ServerStream`].

pub mod error;
pub mod server_call;

pub use crate::error::CallError;
pub use crate::server_call::ServerCall;
