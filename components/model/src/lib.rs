pub mod error;
pub mod metadata;
pub mod method;
pub mod status;

pub use crate::error::MarshalError;
pub use crate::metadata::Metadata;
pub use crate::method::Marshaller;
pub use crate::method::MethodDescriptor;
pub use crate::method::MethodKind;
pub use crate::status::Status;
pub use crate::status::StatusCode;
