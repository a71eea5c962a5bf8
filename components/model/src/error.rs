use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("Failed to marshal message. Cause: {0}")]
    Encode(String),

    #[error("Failed to unmarshal message. Cause: {0}")]
    Decode(String),
}
