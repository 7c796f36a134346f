//! Error types for the tile proxy.

use thiserror::Error;

/// Result type alias using CorrectorError.
pub type CorrectorResult<T> = Result<T, CorrectorError>;

/// Top-level error taxonomy for the corrective tile proxy.
#[derive(Debug, Error)]
pub enum CorrectorError {
    // === Start-up Errors ===
    #[error("Invalid configuration: {0}")]
    Config(String),

    // === Request Errors ===
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Failed to fetch tile: {0}")]
    Network(String),

    // === Data Errors ===
    #[error("Invalid archive: {0}")]
    Format(String),

    #[error("Failed to decode vector tile: {0}")]
    Decode(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CorrectorError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            CorrectorError::BadRequest(_) => 400,
            CorrectorError::Network(_) => 502,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for CorrectorError {
    fn from(err: std::io::Error) -> Self {
        CorrectorError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for CorrectorError {
    fn from(err: serde_json::Error) -> Self {
        CorrectorError::Config(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(CorrectorError::BadRequest("x".into()).http_status_code(), 400);
        assert_eq!(CorrectorError::Network("x".into()).http_status_code(), 502);
        assert_eq!(CorrectorError::Internal("x".into()).http_status_code(), 500);
        assert_eq!(CorrectorError::Decode("x".into()).http_status_code(), 500);
    }
}
