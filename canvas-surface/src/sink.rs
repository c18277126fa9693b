//! Export sinks: where encoded images end up.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use canvas_renderer::{EncodedImage, FileType};
use serde::Serialize;

use crate::error::SurfaceResult;

/// Reference to a persisted export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    /// Opaque locator understood by the sink that produced it.
    pub uri: String,
    /// Filesystem path, for sinks that write files.
    pub path: Option<PathBuf>,
    /// Encoded format.
    pub file_type: FileType,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Encoded size in bytes.
    pub byte_len: usize,
}

/// Destination for encoded exports.
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Store `image` produced from `surface` and describe where it went.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be stored.
    async fn persist(&self, surface: &str, image: EncodedImage) -> SurfaceResult<ArtifactRef>;
}

/// Writes each export to `<dir>/<surface>-<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct FsSink {
    dir: PathBuf,
}

impl FsSink {
    /// Sink writing into `dir`, created on first export.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sink writing into the system temporary directory.
    #[must_use]
    pub fn temp() -> Self {
        Self::new(std::env::temp_dir().join("canvas-exports"))
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ExportSink for FsSink {
    async fn persist(&self, surface: &str, image: EncodedImage) -> SurfaceResult<ArtifactRef> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = format!(
            "{}-{}.{}",
            file_stem(surface),
            uuid::Uuid::new_v4(),
            image.file_type.extension()
        );
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &image.bytes).await?;
        tracing::debug!(surface, path = %path.display(), bytes = image.bytes.len(), "export written");

        Ok(ArtifactRef {
            uri: format!("file://{}", path.display()),
            path: Some(path),
            file_type: image.file_type,
            width: image.width,
            height: image.height,
            byte_len: image.bytes.len(),
        })
    }
}

/// Keep surface names from escaping the output directory.
fn file_stem(surface: &str) -> String {
    let stem: String = surface
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "surface".to_string()
    } else {
        stem
    }
}

/// Keeps exports in memory under `memory://<surface>/<n>` URIs.
#[derive(Debug, Default)]
pub struct MemorySink {
    images: Mutex<HashMap<String, EncodedImage>>,
    next: AtomicU64,
}

impl MemorySink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The image stored under `uri`.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<EncodedImage> {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
    }

    /// Number of stored images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn persist(&self, surface: &str, image: EncodedImage) -> SurfaceResult<ArtifactRef> {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let uri = format!("memory://{surface}/{n}");
        let artifact = ArtifactRef {
            uri: uri.clone(),
            path: None,
            file_type: image.file_type,
            width: image.width,
            height: image.height,
            byte_len: image.bytes.len(),
        };
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uri, image);
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> EncodedImage {
        EncodedImage {
            bytes: vec![1, 2, 3],
            file_type: FileType::Png,
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(file_stem("share-canvas"), "share-canvas");
        assert_eq!(file_stem("../etc/x"), "___etc_x");
        assert_eq!(file_stem(""), "surface");
    }

    #[tokio::test]
    async fn test_memory_sink_numbers_uris() {
        let sink = MemorySink::new();
        let first = sink.persist("s", image()).await.expect("persist");
        let second = sink.persist("s", image()).await.expect("persist");
        assert_eq!(first.uri, "memory://s/1");
        assert_eq!(second.uri, "memory://s/2");
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.get(&first.uri).expect("stored").bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fs_sink_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FsSink::new(dir.path().join("out"));
        let artifact = sink.persist("share-canvas", image()).await.expect("persist");

        let path = artifact.path.expect("path");
        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("share-canvas-")));
        assert_eq!(std::fs::read(&path).expect("read"), vec![1, 2, 3]);
        assert_eq!(artifact.byte_len, 3);
    }
}
