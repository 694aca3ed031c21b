//! Error types for diagram rendering and file uploads.

use thiserror::Error;

/// Errors raised while rendering diagrams or storing uploads.
#[derive(Debug, Error)]
pub enum DiagramError {
    /// Transport failure talking to the rendering service.
    #[error("rendering request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The rendering service answered with a non-success status.
    #[error("rendering service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The upload or rendered image was empty.
    #[error("image is empty")]
    EmptyImage,
    /// The upload is not an accepted image type.
    #[error("unsupported image type: {0}")]
    UnsupportedImageType(String),
    /// The diagram source could not be encoded for the rendering service.
    #[error("cannot encode diagram: {0}")]
    Encoding(String),
    /// Filesystem failure in the output directory.
    #[error("upload storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for diagram operations.
pub type DiagramResult<T> = Result<T, DiagramError>;
