//! # Canvas CLI
//!
//! Replays JSON draw scripts through the surface pipeline and writes the
//! exported images to disk.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p canvas-cli -- demos/share_card.json --out-dir out --assets demos
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `CliConfig` - Resolved settings for one run
//! - `run` - Loads the scripts, runs them on one registry, reports artifacts

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use canvas_core::{BufferPolicy, Script};
use canvas_renderer::{ImageStore, ImageStoreConfig, MissingImagePolicy, TextConfig};
use canvas_surface::{run_script, ArtifactRef, FsSink, PipelineConfig, SurfaceRegistry};
use clap::Parser;

/// Command-line arguments for canvas-cli.
#[derive(Debug, Clone, Parser)]
#[command(name = "canvas-cli")]
#[command(about = "Render canvas draw scripts to PNG/JPEG files")]
#[command(version)]
pub struct CliArgs {
    /// Script files to run, in order
    #[arg(required = true)]
    pub scripts: Vec<PathBuf>,

    /// Directory exports are written to
    #[arg(long, env = "CANVAS_OUT_DIR", default_value = "canvas-out")]
    pub out_dir: PathBuf,

    /// Directory image identifiers are resolved against
    #[arg(long, env = "CANVAS_ASSETS")]
    pub assets: Option<PathBuf>,

    /// Extra font directory (repeatable)
    #[arg(long = "font-dir")]
    pub font_dirs: Vec<PathBuf>,

    /// Do not load system fonts
    #[arg(long)]
    pub no_system_fonts: bool,

    /// Keep recorded commands across flushes
    #[arg(long)]
    pub retain_buffer: bool,

    /// Draw nothing for unresolvable images instead of failing the flush
    #[arg(long)]
    pub skip_missing_images: bool,

    /// Print the artifacts as JSON
    #[arg(long)]
    pub json: bool,
}

/// Settings for one CLI run.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Script files, run in order.
    pub scripts: Vec<PathBuf>,
    /// Output directory.
    pub out_dir: PathBuf,
    /// Image asset root.
    pub assets: Option<PathBuf>,
    /// Pipeline settings shared by every surface.
    pub pipeline: PipelineConfig,
    /// Print artifacts as JSON.
    pub json: bool,
}

impl From<CliArgs> for CliConfig {
    fn from(args: CliArgs) -> Self {
        // Flags win over CANVAS_BUFFER_POLICY / CANVAS_MISSING_IMAGES.
        let mut pipeline = PipelineConfig::from_env().with_text(TextConfig {
            load_system_fonts: !args.no_system_fonts,
            font_dirs: args.font_dirs,
            ..TextConfig::default()
        });
        if args.retain_buffer {
            pipeline = pipeline.with_buffer_policy(BufferPolicy::Retain);
        }
        if args.skip_missing_images {
            pipeline = pipeline.with_missing_images(MissingImagePolicy::Skip);
        }
        Self {
            scripts: args.scripts,
            out_dir: args.out_dir,
            assets: args.assets,
            pipeline,
            json: args.json,
        }
    }
}

/// Outcome of one script.
#[derive(Debug)]
pub struct ScriptOutcome {
    /// Script file.
    pub script: PathBuf,
    /// Exports written.
    pub artifacts: Vec<ArtifactRef>,
    /// Human-readable failures: rejected steps, flushes and exports.
    pub failures: Vec<String>,
}

/// Run every script on one registry and collect what each produced.
///
/// Nothing here aborts the run: a script that cannot be read, parsed or
/// provisioned is reported in its own [`ScriptOutcome::failures`] and the
/// scripts after it still run.
pub async fn run(config: &CliConfig) -> Vec<ScriptOutcome> {
    let images = ImageStore::with_config(ImageStoreConfig {
        asset_root: config.assets.clone(),
        ..ImageStoreConfig::default()
    });
    let registry = SurfaceRegistry::new(
        config.pipeline.clone(),
        Arc::new(images),
        Arc::new(FsSink::new(&config.out_dir)),
    );

    let mut outcomes = Vec::with_capacity(config.scripts.len());
    for path in &config.scripts {
        let mut outcome = ScriptOutcome {
            script: path.clone(),
            artifacts: Vec::new(),
            failures: Vec::new(),
        };
        if let Err(error) = run_one(&registry, path, &mut outcome).await {
            outcome.failures.push(format!("{error:#}"));
        }
        for failure in &outcome.failures {
            tracing::warn!(script = %path.display(), "{failure}");
        }
        outcomes.push(outcome);
    }
    outcomes
}

async fn run_one(
    registry: &SurfaceRegistry,
    path: &Path,
    outcome: &mut ScriptOutcome,
) -> anyhow::Result<()> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let script = Script::from_json(&json).with_context(|| format!("parsing {}", path.display()))?;
    tracing::info!(script = %path.display(), surface = %script.surface, "running script");

    let run = run_script(registry, &script).await;
    registry.teardown(&script.surface);
    let run = run.with_context(|| format!("running {}", path.display()))?;

    outcome.failures.extend(
        run.report
            .errors
            .iter()
            .map(|e| format!("step {}: {}", e.index, e.error)),
    );
    outcome.failures.extend(
        run.flushes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(|e| format!("draw: {e}")),
    );
    outcome.failures.extend(
        run.exports
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(|e| format!("export: {e}")),
    );
    outcome.artifacts = run.artifacts().cloned().collect();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_config() {
        let args = CliArgs::try_parse_from([
            "canvas-cli",
            "card.json",
            "--out-dir",
            "/tmp/out",
            "--font-dir",
            "fonts",
            "--no-system-fonts",
            "--retain-buffer",
            "--skip-missing-images",
        ])
        .expect("parse");
        let config = CliConfig::from(args);
        assert_eq!(config.scripts, vec![PathBuf::from("card.json")]);
        assert_eq!(config.out_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.pipeline.buffer_policy, BufferPolicy::Retain);
        assert_eq!(config.pipeline.missing_images, MissingImagePolicy::Skip);
        assert!(!config.pipeline.text.load_system_fonts);
        assert_eq!(config.pipeline.text.font_dirs, vec![PathBuf::from("fonts")]);
    }

    #[test]
    fn test_script_required() {
        assert!(CliArgs::try_parse_from(["canvas-cli"]).is_err());
    }
}
