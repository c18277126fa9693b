//! Error types for canvas operations.
//!
//! Every variant here is a validation error: the call that produced it was a
//! no-op and the [`DrawingContext`](crate::DrawingContext) stays usable.

use thiserror::Error;

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Errors that can occur while recording drawing operations.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// A geometry argument was NaN or infinite.
    #[error("Non-finite value for {name}: {value}")]
    NonFiniteGeometry {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: f32,
    },

    /// A paint string could not be parsed as a color.
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// A gradient stop offset was outside `[0, 1]`.
    #[error("Gradient stop offset out of range [0, 1]: {0}")]
    InvalidStopOffset(f32),

    /// Line width must be a positive finite number.
    #[error("Invalid line width: {0}")]
    InvalidLineWidth(f32),

    /// Font size must be a positive finite number.
    #[error("Invalid font size: {0}")]
    InvalidFontSize(f32),

    /// Global alpha must be within `[0, 1]`.
    #[error("Invalid global alpha: {0}")]
    InvalidGlobalAlpha(f32),

    /// An enumerated style keyword (line join, line cap, text align) was not recognized.
    #[error("Invalid {kind} keyword: {value}")]
    InvalidKeyword {
        /// Which style property was being parsed.
        kind: &'static str,
        /// The rejected keyword.
        value: String,
    },

    /// `max_width` for text must be a positive finite number.
    #[error("Invalid max width: {0}")]
    InvalidMaxWidth(f32),

    /// An image identifier was empty.
    #[error("Image identifier must not be empty")]
    EmptyImageId,

    /// An image destination had a width without a height, or the reverse.
    #[error("Image destination is missing its {0}")]
    PartialImageSize(&'static str),

    /// A draw script referenced a gradient that was never created.
    #[error("Unknown gradient: {0}")]
    UnknownGradient(String),

    /// Script serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
