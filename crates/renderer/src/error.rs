//! Rendering errors.

use thiserror::Error;

use tile_common::CorrectorError;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot decode tile image: {0}")]
    ImageDecode(String),

    #[error("unsupported tile image format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot allocate a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },

    #[error("cannot encode tile image: {0}")]
    Encode(String),
}

impl From<RenderError> for CorrectorError {
    fn from(err: RenderError) -> Self {
        CorrectorError::Render(err.to_string())
    }
}
