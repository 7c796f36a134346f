//! Vector tile decode errors.

use thiserror::Error;

pub type DecodeResult<T> = Result<T, DecodeError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("tile is not a valid protobuf message: {0}")]
    Protobuf(String),

    #[error("layer #{index} is not a valid protobuf message: {message}")]
    Layer { index: usize, message: String },

    #[error("layer '{layer}' feature {feature}: {message}")]
    Geometry {
        layer: String,
        feature: usize,
        message: String,
    },

    #[error("layer '{layer}' has invalid property tags: {message}")]
    Tags { layer: String, message: String },
}

impl DecodeError {
    /// Name of the affected layer, when known.
    pub fn layer(&self) -> Option<&str> {
        match self {
            DecodeError::Geometry { layer, .. } | DecodeError::Tags { layer, .. } => Some(layer),
            _ => None,
        }
    }
}
