//! Single-line text rasterization.
//!
//! Text is laid out by `usvg` from a one-element SVG document and rendered
//! by `resvg` into an alpha coverage mask. The caller fills that mask with
//! the current paint, so gradients and global alpha apply to text exactly
//! as they do to rectangles.

use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use canvas_core::TextAlign;
use tiny_skia::{Mask, MaskType, Pixmap, Transform};
use usvg::fontdb;

use crate::error::{RenderError, RenderResult};

/// Font configuration for a [`TextRasterizer`].
#[derive(Debug, Clone)]
pub struct TextConfig {
    /// Load the fonts installed on the host.
    pub load_system_fonts: bool,
    /// Extra directories scanned for font files.
    pub font_dirs: Vec<PathBuf>,
    /// Family tried after the style's own family.
    pub default_family: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            load_system_fonts: true,
            font_dirs: Vec::new(),
            default_family: "sans-serif".to_string(),
        }
    }
}

/// A line of text to rasterize.
#[derive(Debug, Clone, Copy)]
pub struct TextRun<'a> {
    /// Characters to draw.
    pub text: &'a str,
    /// Anchor x; its meaning depends on `align`.
    pub x: f32,
    /// Baseline y.
    pub y: f32,
    /// Font size in pixels.
    pub font_size: f32,
    /// Font family list.
    pub font_family: &'a str,
    /// Horizontal alignment around `x`.
    pub align: TextAlign,
    /// Condense horizontally to fit this width.
    pub max_width: Option<f32>,
}

/// Lays out text and produces coverage masks.
#[derive(Clone)]
pub struct TextRasterizer {
    fontdb: Arc<fontdb::Database>,
    default_family: String,
}

impl TextRasterizer {
    /// Build a rasterizer, loading fonts as configured.
    #[must_use]
    pub fn new(config: &TextConfig) -> Self {
        let mut db = fontdb::Database::new();
        if config.load_system_fonts {
            db.load_system_fonts();
        }
        for dir in &config.font_dirs {
            db.load_fonts_dir(dir);
        }
        tracing::debug!(faces = db.len(), "font database loaded");
        Self {
            fontdb: Arc::new(db),
            default_family: config.default_family.clone(),
        }
    }

    /// Number of font faces available.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.fontdb.len()
    }

    /// Natural advance width of a run, before any `max_width` condensing.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot be laid out.
    pub fn measure(&self, run: &TextRun<'_>, width: u32, height: u32) -> RenderResult<f32> {
        let tree = self.layout(run, None, width, height)?;
        Ok(tree.root().abs_bounding_box().width())
    }

    /// Rasterize a run into a coverage mask the size of the target surface.
    ///
    /// Returns `None` when the run produces no visible glyphs.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot be laid out or the mask cannot be allocated.
    pub fn coverage(&self, run: &TextRun<'_>, width: u32, height: u32) -> RenderResult<Option<Mask>> {
        if run.text.trim().is_empty() {
            return Ok(None);
        }

        let mut tree = self.layout(run, None, width, height)?;
        let natural = tree.root().abs_bounding_box().width();
        if natural <= 0.0 {
            return Ok(None);
        }
        if let Some(max) = run.max_width.filter(|max| natural > *max) {
            tree = self.layout(run, Some(max / natural), width, height)?;
        }

        let mut glyphs = Pixmap::new(width, height)
            .ok_or(RenderError::InvalidDimensions { width, height })?;
        resvg::render(&tree, Transform::identity(), &mut glyphs.as_mut());
        Ok(Some(Mask::from_pixmap(glyphs.as_ref(), MaskType::Alpha)))
    }

    fn layout(
        &self,
        run: &TextRun<'_>,
        condense: Option<f32>,
        width: u32,
        height: u32,
    ) -> RenderResult<usvg::Tree> {
        let svg = self.svg_document(run, condense, width, height);
        let mut options = usvg::Options::default();
        options.fontdb = Arc::clone(&self.fontdb);
        options.font_family.clone_from(&self.default_family);
        usvg::Tree::from_str(&svg, &options).map_err(|e| RenderError::Text(e.to_string()))
    }

    fn svg_document(&self, run: &TextRun<'_>, condense: Option<f32>, width: u32, height: u32) -> String {
        let anchor = match run.align {
            TextAlign::Left => "start",
            TextAlign::Center => "middle",
            TextAlign::Right => "end",
        };
        let family = if run.font_family.is_empty() {
            escape_xml(&self.default_family)
        } else {
            escape_xml(&format!("{}, {}", run.font_family, self.default_family))
        };

        let mut svg = String::with_capacity(256 + run.text.len());
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}">"#
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-size="{}" font-family="{family}" text-anchor="{anchor}" fill="black" xml:space="preserve""#,
            run.x, run.y, run.font_size
        );
        if let Some(k) = condense {
            let _ = write!(
                svg,
                r#" transform="translate({x} 0) scale({k} 1) translate({neg} 0)""#,
                x = run.x,
                neg = -run.x
            );
        }
        let _ = write!(svg, ">{}</text></svg>", escape_xml(run.text));
        svg
    }
}

impl std::fmt::Debug for TextRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRasterizer")
            .field("faces", &self.fontdb.len())
            .field("default_family", &self.default_family)
            .finish()
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
