//! Archive error types.

use thiserror::Error;

use tile_common::CorrectorError;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a PMTiles archive (bad magic)")]
    BadMagic,

    #[error("unsupported PMTiles version {0}, expected 3")]
    UnsupportedVersion(u8),

    #[error("unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("malformed directory: {0}")]
    MalformedDirectory(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("read of {len} bytes at offset {offset} is out of range")]
    OutOfRange { offset: u64, len: u64 },

    #[error("invalid metadata: {0}")]
    Metadata(String),
}

impl ArchiveError {
    /// Whether the error means the file itself is not a usable archive.
    pub fn is_format_error(&self) -> bool {
        !matches!(self, ArchiveError::Io(_))
    }
}

impl From<ArchiveError> for CorrectorError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io(e) => CorrectorError::Internal(e.to_string()),
            other => CorrectorError::Format(other.to_string()),
        }
    }
}
