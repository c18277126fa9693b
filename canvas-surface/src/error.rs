//! Pipeline error types.

use canvas_renderer::{ExportRequestError, RenderError};
use thiserror::Error;

/// Result type for surface operations.
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Errors delivered through flush and export completions.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// No surface was provisioned under this name.
    #[error("Unknown surface: {0}")]
    UnknownSurface(String),

    /// A surface with this name is already provisioned.
    #[error("Surface already exists: {0}")]
    SurfaceExists(String),

    /// The surface was torn down before the request could run.
    #[error("Surface closed: {0}")]
    SurfaceClosed(String),

    /// Export requested before any flush succeeded.
    #[error("Nothing rendered on surface {0}")]
    NothingRendered(String),

    /// Export options rejected for this surface.
    #[error("Invalid export request: {0}")]
    InvalidExport(#[from] ExportRequestError),

    /// Rasterization or encoding failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The export sink could not persist the artifact.
    #[error("Export sink failed: {0}")]
    Sink(String),

    /// Filesystem error from a sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for SurfaceError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
