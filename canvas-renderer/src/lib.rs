//! # Canvas Renderer
//!
//! Software rasterizer for recorded canvas commands, built on tiny-skia.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │         Recorded commands (Arc<[..]>)       │
//! ├─────────────────────────────────────────────┤
//! │              Rasterizer::replay             │
//! ├─────────────┬─────────────┬─────────────────┤
//! │ Rects       │ Text        │ Images          │
//! │ (tiny-skia) │ (usvg/resvg)│ (ImageProvider) │
//! ├─────────────┴─────────────┴─────────────────┤
//! │      Pixmap ──> encode ──> PNG / JPEG       │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod export;
pub mod image;
pub mod raster;
pub mod text;
pub mod texture_cache;

pub use error::{RenderError, RenderResult};
pub use export::{
    encode, to_rgba_image, EncodedImage, ExportOptions, ExportPlan, ExportRequestError, FileType,
};
pub use crate::image::{ImageProvider, ImageStore, ImageStoreConfig, Texture};
pub use raster::{new_bitmap, MissingImagePolicy, Rasterizer, ReplayReport};
pub use text::{TextConfig, TextRasterizer};

/// Bitmap type the rasterizer draws into.
pub use tiny_skia::Pixmap;
