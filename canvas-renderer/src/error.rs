//! Renderer error types.

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while rasterizing or encoding a surface.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A bitmap could not be allocated with the requested size.
    #[error("Invalid bitmap dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// The image provider has no image under this identifier.
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// Resource loading or decoding failed.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// Text could not be laid out or rasterized.
    #[error("Text rendering failed: {0}")]
    Text(String),

    /// Encoding the bitmap into a file format failed.
    #[error("Encoding failed: {0}")]
    Encode(String),
}
