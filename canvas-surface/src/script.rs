//! Running a recorded draw script through a surface pipeline.

use canvas_core::{PipelineStep, Script, ScriptRecorder, ScriptReport};
use canvas_renderer::ExportOptions;

use crate::error::{SurfaceError, SurfaceResult};
use crate::pending::Pending;
use crate::registry::SurfaceRegistry;
use crate::sink::ArtifactRef;
use crate::worker::FlushReport;

/// Everything a script run produced, in step order.
#[derive(Debug)]
pub struct ScriptRun {
    /// Recording steps rejected by validation.
    pub report: ScriptReport,
    /// Outcome of each `draw` step.
    pub flushes: Vec<SurfaceResult<FlushReport>>,
    /// Outcome of each `export` step.
    pub exports: Vec<SurfaceResult<ArtifactRef>>,
}

impl ScriptRun {
    /// Artifacts of the exports that succeeded.
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactRef> {
        self.exports.iter().filter_map(|r| r.as_ref().ok())
    }

    /// Whether every step, flush and export succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.report.is_clean()
            && self.flushes.iter().all(Result::is_ok)
            && self.exports.iter().all(Result::is_ok)
    }
}

/// Provision the script's surface if needed, record every step, queue its
/// flushes and exports in order, and wait for all of them.
///
/// # Errors
///
/// Returns an error only if the surface cannot be provisioned or
/// referenced; per-step failures are reported in the [`ScriptRun`].
pub async fn run_script(registry: &SurfaceRegistry, script: &Script) -> SurfaceResult<ScriptRun> {
    if !registry.contains(&script.surface) {
        registry.provision(&script.surface, script.width, script.height)?;
    }
    let canvas = registry.context(&script.surface)?;

    let mut recorder = ScriptRecorder::new();
    let mut flushes: Vec<Pending<FlushReport>> = Vec::new();
    let mut exports: Vec<Result<Pending<ArtifactRef>, SurfaceError>> = Vec::new();

    for (index, step) in script.steps.iter().enumerate() {
        let queued = canvas.with_context(|ctx| recorder.apply(ctx, index, step));
        match queued {
            Some(PipelineStep::Draw { reserve }) => flushes.push(canvas.draw(reserve)),
            Some(PipelineStep::Export(spec)) => exports.push(
                ExportOptions::try_from(&spec)
                    .map(|options| canvas.export(options))
                    .map_err(SurfaceError::from),
            ),
            None => {}
        }
    }
    tracing::debug!(
        surface = %script.surface,
        steps = script.steps.len(),
        flushes = flushes.len(),
        exports = exports.len(),
        "script queued"
    );

    let flushes = futures::future::join_all(flushes).await;
    let exports = futures::future::join_all(exports.into_iter().map(|queued| async move {
        match queued {
            Ok(pending) => pending.await,
            Err(error) => Err(error),
        }
    }))
    .await;

    Ok(ScriptRun {
        report: recorder.into_report(),
        flushes,
        exports,
    })
}
