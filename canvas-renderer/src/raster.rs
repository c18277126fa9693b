//! Command replay onto a bitmap.
//!
//! [`Rasterizer::replay`] draws recorded commands in order with the style
//! snapshot each one carries. It is synchronous and CPU bound; the surface
//! pipeline runs it on a blocking thread against a working copy of the
//! bitmap so that a failed replay never reaches the committed pixels.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use canvas_core::{
    CanvasError, Color, Command, DrawOp, Gradient, ImageDest, LineCap, LineJoin, Paint, Rect,
    StyleState,
};
use serde::{Deserialize, Serialize};
use tiny_skia::{
    BlendMode, FilterQuality, Mask, PathBuilder, Pattern, Pixmap, PremultipliedColorU8,
    SpreadMode, Stroke, Transform,
};

use crate::error::{RenderError, RenderResult};
use crate::image::{ImageProvider, Texture};
use crate::text::{TextRasterizer, TextRun};

/// What to do when `drawImage` names an image the provider cannot supply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingImagePolicy {
    /// Fail the whole replay.
    #[default]
    Fail,
    /// Skip the command, log a warning and report the identifier.
    Skip,
}

impl FromStr for MissingImagePolicy {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            _ => Err(CanvasError::InvalidKeyword {
                kind: "missing image policy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MissingImagePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fail => "fail",
            Self::Skip => "skip",
        })
    }
}

/// Outcome of a successful replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Number of commands replayed, skipped ones included.
    pub commands: usize,
    /// Images skipped under [`MissingImagePolicy::Skip`], in command order.
    pub skipped_images: Vec<String>,
}

/// Allocate a transparent bitmap.
///
/// # Errors
///
/// Returns [`RenderError::InvalidDimensions`] if either side is zero.
pub fn new_bitmap(width: u32, height: u32) -> RenderResult<Pixmap> {
    Pixmap::new(width, height).ok_or(RenderError::InvalidDimensions { width, height })
}

/// Replays recorded commands onto a bitmap.
#[derive(Clone)]
pub struct Rasterizer {
    images: Arc<dyn ImageProvider>,
    text: TextRasterizer,
    missing_images: MissingImagePolicy,
}

impl Rasterizer {
    /// Create a rasterizer over an image provider.
    #[must_use]
    pub fn new(images: Arc<dyn ImageProvider>, text: TextRasterizer) -> Self {
        Self {
            images,
            text,
            missing_images: MissingImagePolicy::default(),
        }
    }

    /// Set the missing image policy.
    #[must_use]
    pub fn with_missing_images(mut self, policy: MissingImagePolicy) -> Self {
        self.missing_images = policy;
        self
    }

    /// The missing image policy in effect.
    #[must_use]
    pub fn missing_images(&self) -> MissingImagePolicy {
        self.missing_images
    }

    /// Replay `commands` onto `target` in order.
    ///
    /// On error `target` may hold a partial result; callers that need
    /// atomicity replay into a copy.
    ///
    /// # Errors
    ///
    /// Returns an error if an image cannot be resolved under
    /// [`MissingImagePolicy::Fail`], or if text cannot be laid out.
    pub fn replay(&self, target: &mut Pixmap, commands: &[Command]) -> RenderResult<ReplayReport> {
        let mut pass = Pass {
            target,
            gradients: HashMap::new(),
        };
        let mut report = ReplayReport::default();

        for command in commands {
            tracing::trace!(op = command.op.name(), "replay");
            let style = &command.style;
            match &command.op {
                DrawOp::FillRect(rect) => pass.fill_rect(*rect, &style.fill, style.global_alpha),
                DrawOp::StrokeRect(rect) => pass.stroke_rect(*rect, style),
                DrawOp::ClearRect(rect) => pass.clear_rect(*rect),
                DrawOp::FillText {
                    text,
                    x,
                    y,
                    max_width,
                } => {
                    let run = TextRun {
                        text,
                        x: *x,
                        y: *y,
                        font_size: style.font_size,
                        font_family: &style.font_family,
                        align: style.text_align,
                        max_width: *max_width,
                    };
                    let mask = self
                        .text
                        .coverage(&run, pass.target.width(), pass.target.height())?;
                    if let Some(mask) = mask {
                        pass.fill_mask(&mask, &style.fill, style.global_alpha);
                    }
                }
                DrawOp::DrawImage {
                    image,
                    source,
                    dest,
                } => match self.images.resolve(image) {
                    Ok(texture) => pass.draw_image(&texture, *source, *dest, style.global_alpha),
                    Err(error) => match self.missing_images {
                        MissingImagePolicy::Fail => return Err(error),
                        MissingImagePolicy::Skip => {
                            tracing::warn!(image = %image, %error, "skipping drawImage");
                            report.skipped_images.push(image.clone());
                        }
                    },
                },
            }
            report.commands += 1;
        }

        Ok(report)
    }
}

impl fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rasterizer")
            .field("text", &self.text)
            .field("missing_images", &self.missing_images)
            .finish_non_exhaustive()
    }
}

/// State for one replay: the target and gradients sampled so far.
///
/// Gradient keys are pointer identities, which stay valid only while the
/// commands holding them are alive, so the cache never outlives a pass.
struct Pass<'t> {
    target: &'t mut Pixmap,
    gradients: HashMap<usize, Pixmap>,
}

impl Pass<'_> {
    fn full_rect(&self) -> Option<tiny_skia::Rect> {
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (self.target.width() as f32, self.target.height() as f32);
        tiny_skia::Rect::from_xywh(0.0, 0.0, w, h)
    }

    fn with_paint<F>(&mut self, paint: &Paint, global_alpha: f32, draw: F)
    where
        F: FnOnce(&mut Pixmap, &tiny_skia::Paint<'_>),
    {
        match paint {
            Paint::Color(color) => {
                let mut skia = tiny_skia::Paint {
                    anti_alias: true,
                    ..Default::default()
                };
                skia.set_color(skia_color(color.with_alpha_scaled(global_alpha)));
                draw(&mut *self.target, &skia);
            }
            Paint::Gradient(gradient) => {
                let (width, height) = (self.target.width(), self.target.height());
                let Some(pixels) = gradient_pixmap(&mut self.gradients, gradient, width, height)
                else {
                    return;
                };
                let skia = tiny_skia::Paint {
                    anti_alias: true,
                    shader: Pattern::new(
                        pixels.as_ref(),
                        SpreadMode::Pad,
                        FilterQuality::Nearest,
                        global_alpha,
                        Transform::identity(),
                    ),
                    ..Default::default()
                };
                draw(&mut *self.target, &skia);
            }
        }
    }

    fn fill_rect(&mut self, rect: Rect, paint: &Paint, global_alpha: f32) {
        let Some(rect) = skia_rect(rect) else {
            return;
        };
        self.with_paint(paint, global_alpha, |target, skia| {
            target.fill_rect(rect, skia, Transform::identity(), None);
        });
    }

    fn stroke_rect(&mut self, rect: Rect, style: &StyleState) {
        let rect = rect.normalized();
        if rect.width <= 0.0 && rect.height <= 0.0 {
            return;
        }
        let mut pb = PathBuilder::new();
        pb.move_to(rect.left(), rect.top());
        pb.line_to(rect.right(), rect.top());
        pb.line_to(rect.right(), rect.bottom());
        pb.line_to(rect.left(), rect.bottom());
        pb.close();
        let Some(path) = pb.finish() else {
            return;
        };
        let stroke = Stroke {
            width: style.line_width,
            line_cap: match style.line_cap {
                LineCap::Butt => tiny_skia::LineCap::Butt,
                LineCap::Round => tiny_skia::LineCap::Round,
                LineCap::Square => tiny_skia::LineCap::Square,
            },
            line_join: match style.line_join {
                LineJoin::Miter => tiny_skia::LineJoin::Miter,
                LineJoin::Round => tiny_skia::LineJoin::Round,
                LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
            },
            miter_limit: 10.0,
            dash: None,
        };
        self.with_paint(&style.stroke, style.global_alpha, |target, skia| {
            target.stroke_path(&path, skia, &stroke, Transform::identity(), None);
        });
    }

    fn clear_rect(&mut self, rect: Rect) {
        let Some(rect) = skia_rect(rect) else {
            return;
        };
        let paint = tiny_skia::Paint {
            blend_mode: BlendMode::Clear,
            ..Default::default()
        };
        self.target
            .fill_rect(rect, &paint, Transform::identity(), None);
    }

    fn fill_mask(&mut self, mask: &Mask, paint: &Paint, global_alpha: f32) {
        let Some(full) = self.full_rect() else {
            return;
        };
        self.with_paint(paint, global_alpha, |target, skia| {
            target.fill_rect(full, skia, Transform::identity(), Some(mask));
        });
    }

    fn draw_image(
        &mut self,
        texture: &Texture,
        source: Option<Rect>,
        dest: ImageDest,
        global_alpha: f32,
    ) {
        #[allow(clippy::cast_precision_loss)]
        let bounds = Rect {
            x: 0.0,
            y: 0.0,
            width: texture.width() as f32,
            height: texture.height() as f32,
        };
        let requested = source.map_or(bounds, Rect::normalized);
        let (dest, requested) = match dest {
            ImageDest::At(p) => (
                Rect {
                    x: p.x,
                    y: p.y,
                    width: requested.width,
                    height: requested.height,
                },
                requested,
            ),
            ImageDest::Scaled(rect) => (rect.normalized(), requested),
        };
        if requested.is_empty() || dest.is_empty() {
            return;
        }

        let sx = dest.width / requested.width;
        let sy = dest.height / requested.height;

        // A source rect reaching outside the image shrinks the destination with it.
        let Some(src) = requested.intersect(bounds) else {
            return;
        };
        let clipped = Rect {
            x: dest.x + (src.x - requested.x) * sx,
            y: dest.y + (src.y - requested.y) * sy,
            width: src.width * sx,
            height: src.height * sy,
        };
        let Some(area) = skia_rect(clipped) else {
            return;
        };

        let transform = Transform::from_row(
            sx,
            0.0,
            0.0,
            sy,
            dest.x - requested.x * sx,
            dest.y - requested.y * sy,
        );
        let quality = if (sx - 1.0).abs() < f32::EPSILON && (sy - 1.0).abs() < f32::EPSILON {
            FilterQuality::Nearest
        } else {
            FilterQuality::Bilinear
        };
        let paint = tiny_skia::Paint {
            anti_alias: true,
            shader: Pattern::new(
                texture.pixmap().as_ref(),
                SpreadMode::Pad,
                quality,
                global_alpha,
                transform,
            ),
            ..Default::default()
        };
        self.target
            .fill_rect(area, &paint, Transform::identity(), None);
    }
}

/// Sample a gradient once per pixel centre over the whole surface.
fn gradient_pixmap<'g>(
    cache: &'g mut HashMap<usize, Pixmap>,
    gradient: &Gradient,
    width: u32,
    height: u32,
) -> Option<&'g Pixmap> {
    let pixmap = match cache.entry(gradient.key()) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => {
            let prepared = gradient.prepare();
            let mut pixmap = Pixmap::new(width, height)?;
            if prepared.is_paintable() {
                let w = width as usize;
                for (i, px) in pixmap.pixels_mut().iter_mut().enumerate() {
                    #[allow(clippy::cast_precision_loss)]
                    let (x, y) = ((i % w) as f32 + 0.5, (i / w) as f32 + 0.5);
                    if let Some(color) = prepared.sample(x, y) {
                        *px = premultiplied(color);
                    }
                }
            }
            entry.insert(pixmap)
        }
    };
    Some(&*pixmap)
}

fn skia_rect(rect: Rect) -> Option<tiny_skia::Rect> {
    let rect = rect.normalized();
    if rect.is_empty() {
        return None;
    }
    tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)
}

fn skia_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba(color.r, color.g, color.b, color.a).unwrap_or(tiny_skia::Color::BLACK)
}

fn premultiplied(color: Color) -> PremultipliedColorU8 {
    let [r, g, b, a] = color.to_rgba8();
    tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply()
}
