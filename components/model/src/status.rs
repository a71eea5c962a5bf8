use std::fmt::{self, Display};

use codec::error::FrameError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Canonical RPC status codes, carried in the reserved trailer keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum StatusCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

/// Terminal disposition of a call: a code plus an optional human-readable
/// description.
///
/// A `Status` is attached to trailers when a stream is closed gracefully and
/// to the abort notification when a stream is torn down by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub message: Option<String>,
}

impl Status {
    pub fn new(code: StatusCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::Ok)
    }

    pub fn cancelled() -> Self {
        Self::new(StatusCode::Cancelled)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal).with_message(message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ResourceExhausted).with_message(message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(StatusCode::DeadlineExceeded).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{:?}: {}", self.code, message),
            None => write!(f, "{:?}", self.code),
        }
    }
}

/// Normalize a codec failure into a status that is safe to hand to the local
/// listener and to the remote peer.
impl From<&FrameError> for Status {
    fn from(e: &FrameError) -> Self {
        match e {
            FrameError::TooLongMessage { .. } => Status::resource_exhausted(e.to_string()),
            _ => Status::internal(e.to_string()),
        }
    }
}
