//! Integration tests for running scripts from disk (canvas-cli).

use std::path::{Path, PathBuf};

use canvas_cli::{run, CliArgs, CliConfig};
use clap::Parser;

const CARD: &str = r##"{
  "surface": "card",
  "width": 120,
  "height": 80,
  "steps": [
    { "op": "setFillStyle", "paint": "#3366ff" },
    { "op": "fillRect", "x": 0, "y": 0, "width": 120, "height": 80 },
    { "op": "drawImage", "image": "avatar.png", "x": 10, "y": 10, "width": 20, "height": 20 },
    { "op": "draw" },
    { "op": "export", "fileType": "png" }
  ]
}"##;

fn config(dir: &Path, extra: &[&str]) -> CliConfig {
    let script = dir.join("card.json");
    std::fs::write(&script, CARD).expect("write script");
    let out = dir.join("out");
    let mut argv = vec![
        "canvas-cli".to_string(),
        script.display().to_string(),
        "--out-dir".to_string(),
        out.display().to_string(),
        "--no-system-fonts".to_string(),
    ];
    argv.extend(extra.iter().map(|s| (*s).to_string()));
    CliConfig::from(CliArgs::try_parse_from(argv).expect("args"))
}

#[tokio::test]
async fn test_missing_image_fails_flush() {
    let dir = tempfile::tempdir().expect("tempdir");
    let outcomes = run(&config(dir.path(), &[])).await;

    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert!(outcome.artifacts.is_empty());
    // The failed flush leaves nothing to export.
    assert_eq!(outcome.failures.len(), 2);
    assert!(outcome.failures[0].starts_with("draw:"));
    assert!(outcome.failures[1].starts_with("export:"));
}

#[tokio::test]
async fn test_skip_missing_images_writes_png() {
    let dir = tempfile::tempdir().expect("tempdir");
    let outcomes = run(&config(dir.path(), &["--skip-missing-images"])).await;

    let outcome = &outcomes[0];
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.artifacts.len(), 1);

    let path: &PathBuf = outcome.artifacts[0].path.as_ref().expect("file");
    assert!(path.starts_with(dir.path().join("out")));
    let img = image::open(path).expect("png").to_rgba8();
    assert_eq!(img.dimensions(), (120, 80));
    assert_eq!(img.get_pixel(60, 40).0, [0x33, 0x66, 0xff, 255]);
}

#[tokio::test]
async fn test_bad_script_does_not_stop_later_ones() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("card.json");
    std::fs::write(&good, CARD).expect("write script");
    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ not json").expect("write script");

    let args = CliArgs::try_parse_from([
        "canvas-cli".to_string(),
        dir.path().join("nope.json").display().to_string(),
        broken.display().to_string(),
        good.display().to_string(),
        "--out-dir".to_string(),
        dir.path().join("out").display().to_string(),
        "--no-system-fonts".to_string(),
        "--skip-missing-images".to_string(),
    ])
    .expect("args");
    let outcomes = run(&CliConfig::from(args)).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].failures[0].starts_with("reading"));
    assert!(outcomes[1].failures[0].starts_with("parsing"));
    assert!(outcomes[2].failures.is_empty(), "{:?}", outcomes[2].failures);
    assert_eq!(outcomes[2].artifacts.len(), 1);
}

#[tokio::test]
async fn test_surface_is_released_after_each_script() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = dir.path().join("first.json");
    std::fs::write(&first, CARD).expect("write script");
    // Same surface name, different size: only valid once the first is gone.
    let second = dir.path().join("second.json");
    std::fs::write(
        &second,
        CARD.replace("\"width\": 120,\n  \"height\": 80", "\"width\": 60,\n  \"height\": 40"),
    )
    .expect("write script");

    let args = CliArgs::try_parse_from([
        "canvas-cli".to_string(),
        first.display().to_string(),
        second.display().to_string(),
        "--out-dir".to_string(),
        dir.path().join("out").display().to_string(),
        "--no-system-fonts".to_string(),
        "--skip-missing-images".to_string(),
    ])
    .expect("args");
    let outcomes = run(&CliConfig::from(args)).await;

    assert!(outcomes.iter().all(|o| o.failures.is_empty()), "{outcomes:?}");
    assert_eq!(outcomes[1].artifacts[0].width, 60);
}

#[tokio::test]
async fn test_demo_share_card() {
    let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos");
    let dir = tempfile::tempdir().expect("tempdir");
    let args = CliArgs::try_parse_from([
        "canvas-cli".to_string(),
        demos.join("share_card.json").display().to_string(),
        "--out-dir".to_string(),
        dir.path().display().to_string(),
        "--assets".to_string(),
        demos.display().to_string(),
        "--no-system-fonts".to_string(),
    ])
    .expect("args");
    let outcomes = run(&CliConfig::from(args)).await;

    let outcome = &outcomes[0];
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    let sizes: Vec<(u32, u32)> = outcome
        .artifacts
        .iter()
        .map(|a| (a.width, a.height))
        .collect();
    assert_eq!(sizes, vec![(420, 300), (210, 150)]);

    // Avatar centre, drawn from demos/avatar.png.
    let png = outcome.artifacts[0].path.as_ref().expect("file");
    let img = image::open(png).expect("png").to_rgba8();
    let centre = img.get_pixel(80, 140).0;
    let expected = [70u8, 130, 180, 255];
    assert!(
        centre.iter().zip(expected).all(|(a, b)| a.abs_diff(b) <= 2),
        "{centre:?}"
    );
}
