use std::sync::Arc;

use bytes::Bytes;

use crate::error::MarshalError;

/// Arity of a method: how many request and response messages it exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

/// Converts typed messages to and from their serialized payload form.
///
/// Payload formats are supplied by the application; the stream core only ever
/// sees opaque bytes.
pub trait Marshaller<T>: Send + Sync {
    fn marshal(&self, value: &T) -> Result<Bytes, MarshalError>;

    fn unmarshal(&self, data: Bytes) -> Result<T, MarshalError>;
}

/// Immutable description of one RPC method: its kind, full name and the
/// marshallers for both message directions.
pub struct MethodDescriptor<Req, Resp> {
    kind: MethodKind,

    /// Fully qualified method name, e.g. `/service/method`.
    full_name: String,

    request_marshaller: Arc<dyn Marshaller<Req>>,

    response_marshaller: Arc<dyn Marshaller<Resp>>,
}

impl<Req, Resp> MethodDescriptor<Req, Resp> {
    pub fn new(
        kind: MethodKind,
        full_name: impl Into<String>,
        request_marshaller: Arc<dyn Marshaller<Req>>,
        response_marshaller: Arc<dyn Marshaller<Resp>>,
    ) -> Self {
        Self {
            kind,
            full_name: full_name.into(),
            request_marshaller,
            response_marshaller,
        }
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn request_marshaller(&self) -> &dyn Marshaller<Req> {
        self.request_marshaller.as_ref()
    }

    pub fn response_marshaller(&self) -> &dyn Marshaller<Resp> {
        self.response_marshaller.as_ref()
    }
}

impl<Req, Resp> Clone for MethodDescriptor<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            full_name: self.full_name.clone(),
            request_marshaller: Arc::clone(&self.request_marshaller),
            response_marshaller: Arc::clone(&self.response_marshaller),
        }
    }
}
