//! # Canvas CLI
//!
//! Renders draw scripts to image files.

use canvas_cli::{run, CliArgs, CliConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,canvas_surface=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    // RUST_LOG_FORMAT=json for machine-readable logs
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = CliConfig::from(CliArgs::parse());
    tracing::info!(
        scripts = config.scripts.len(),
        out_dir = %config.out_dir.display(),
        "Starting canvas-cli"
    );

    let outcomes = run(&config).await;

    let mut failed = 0;
    for outcome in &outcomes {
        failed += outcome.failures.len();
        if config.json {
            println!("{}", serde_json::to_string(&outcome.artifacts)?);
        } else {
            for artifact in &outcome.artifacts {
                println!("{}", artifact.uri);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} step(s) failed");
    }
    Ok(())
}
