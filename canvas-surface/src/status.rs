//! Observable pipeline state of a surface.

use serde::Serialize;

/// What a surface's pipeline is doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Nothing queued or running.
    #[default]
    Idle,
    /// A flush is rasterizing.
    Flushing,
    /// Exports are encoding or persisting and no flush is running.
    Exporting,
}

/// Snapshot of a surface's pipeline, published on every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceStatus {
    /// Current state.
    pub state: PipelineState,
    /// Flushes that committed pixels.
    pub flushes_completed: u64,
    /// Whether any flush has committed yet.
    pub has_content: bool,
    /// Exports accepted but not yet completed.
    pub pending_exports: usize,
}

impl SurfaceStatus {
    /// Leave whichever state follows a finished flush or export.
    pub(crate) fn settle(&mut self) {
        self.state = if self.pending_exports > 0 {
            PipelineState::Exporting
        } else {
            PipelineState::Idle
        };
    }
}
