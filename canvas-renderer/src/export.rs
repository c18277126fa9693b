//! Bitmap export to PNG and JPEG.
//!
//! An [`ExportOptions`] is first resolved against the surface size into an
//! [`ExportPlan`] (region clipped to the surface, output size, encoder
//! settings). [`encode`] then crops, resamples and encodes a bitmap
//! snapshot according to that plan.

use std::fmt;
use std::str::FromStr;

use canvas_core::{ExportSpec, Rect};
use image::ImageEncoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiny_skia::{IntRect, Pixmap};

use crate::error::{RenderError, RenderResult};

/// Encoded output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PNG, lossless with alpha.
    #[default]
    Png,
    /// JPEG, flattened over a background colour.
    Jpeg,
}

impl FileType {
    /// Conventional file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// MIME type.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for FileType {
    type Err = ExportRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            _ => Err(ExportRequestError::FileType(s.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Reasons an export request is rejected before any encoding happens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportRequestError {
    /// Quality outside `[0, 1]` or not a number.
    #[error("quality must be within [0, 1], got {0}")]
    Quality(f32),

    /// The requested region does not overlap the surface.
    #[error("export region does not intersect the {width}x{height} surface")]
    EmptyRegion {
        /// Surface width.
        width: u32,
        /// Surface height.
        height: u32,
    },

    /// Region coordinates are not finite.
    #[error("export region is not finite")]
    NonFiniteRegion,

    /// A destination dimension of zero.
    #[error("destination size must be non-zero")]
    ZeroDestination,

    /// File type name not recognized.
    #[error("unsupported file type: {0}")]
    FileType(String),
}

/// Parameters of an export request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Crop in surface pixels; the whole surface when `None`.
    pub region: Option<Rect>,
    /// Output width; the region width when `None`.
    pub dest_width: Option<u32>,
    /// Output height; the region height when `None`.
    pub dest_height: Option<u32>,
    /// Output format.
    pub file_type: FileType,
    /// JPEG quality in `[0, 1]`. Ignored for PNG.
    pub quality: f32,
    /// Colour JPEG output is flattened over, as RGBA bytes.
    pub background: [u8; 4],
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            region: None,
            dest_width: None,
            dest_height: None,
            file_type: FileType::Png,
            quality: 1.0,
            background: [255, 255, 255, 255],
        }
    }
}

impl ExportOptions {
    /// PNG of the whole surface.
    #[must_use]
    pub fn png() -> Self {
        Self::default()
    }

    /// JPEG of the whole surface at the given quality.
    #[must_use]
    pub fn jpeg(quality: f32) -> Self {
        Self {
            file_type: FileType::Jpeg,
            quality,
            ..Self::default()
        }
    }

    /// Restrict the export to a region.
    #[must_use]
    pub fn with_region(mut self, region: Rect) -> Self {
        self.region = Some(region);
        self
    }

    /// Resample the output to the given size.
    #[must_use]
    pub fn with_dest_size(mut self, width: u32, height: u32) -> Self {
        self.dest_width = Some(width);
        self.dest_height = Some(height);
        self
    }

    /// Resolve these options against a surface of `width` x `height`.
    ///
    /// # Errors
    ///
    /// Returns an error if the quality is out of range, the region misses
    /// the surface, or a destination dimension is zero.
    pub fn plan(&self, width: u32, height: u32) -> Result<ExportPlan, ExportRequestError> {
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(ExportRequestError::Quality(self.quality));
        }
        if self.dest_width == Some(0) || self.dest_height == Some(0) {
            return Err(ExportRequestError::ZeroDestination);
        }

        #[allow(clippy::cast_precision_loss)]
        let surface = Rect {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        };
        let region = self.region.unwrap_or(surface);
        if ![region.x, region.y, region.width, region.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ExportRequestError::NonFiniteRegion);
        }
        let visible = region
            .intersect(surface)
            .ok_or(ExportRequestError::EmptyRegion { width, height })?;

        // Snap outwards to whole pixels; edges are within the surface already.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (x0, y0, x1, y1) = (
            visible.left().floor() as u32,
            visible.top().floor() as u32,
            (visible.right().ceil() as u32).min(width),
            (visible.bottom().ceil() as u32).min(height),
        );
        let crop = IntRect::from_ltrb(
            i32::try_from(x0).unwrap_or(i32::MAX),
            i32::try_from(y0).unwrap_or(i32::MAX),
            i32::try_from(x1).unwrap_or(i32::MAX),
            i32::try_from(y1).unwrap_or(i32::MAX),
        )
        .ok_or(ExportRequestError::EmptyRegion { width, height })?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let jpeg_quality = (self.quality * 100.0).round().clamp(1.0, 100.0) as u8;

        Ok(ExportPlan {
            crop,
            width: self.dest_width.unwrap_or(crop.width()),
            height: self.dest_height.unwrap_or(crop.height()),
            file_type: self.file_type,
            jpeg_quality,
            background: self.background,
        })
    }
}

impl TryFrom<&ExportSpec> for ExportOptions {
    type Error = ExportRequestError;

    fn try_from(spec: &ExportSpec) -> Result<Self, Self::Error> {
        let file_type = spec
            .file_type
            .as_deref()
            .map(FileType::from_str)
            .transpose()?
            .unwrap_or_default();

        // Missing extents reach the surface edge; the plan clips them.
        let region = (spec.x.is_some()
            || spec.y.is_some()
            || spec.width.is_some()
            || spec.height.is_some())
        .then(|| Rect {
            x: spec.x.unwrap_or(0.0),
            y: spec.y.unwrap_or(0.0),
            width: spec.width.unwrap_or(f32::MAX),
            height: spec.height.unwrap_or(f32::MAX),
        });

        Ok(Self {
            region,
            dest_width: spec.dest_width,
            dest_height: spec.dest_height,
            file_type,
            quality: spec.quality.unwrap_or(1.0),
            background: [255, 255, 255, 255],
        })
    }
}

/// Export options resolved against a concrete surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportPlan {
    /// Pixel region read from the surface.
    pub crop: IntRect,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Output format.
    pub file_type: FileType,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
    /// JPEG background.
    pub background: [u8; 4],
}

/// An encoded image ready to hand to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoded file bytes.
    pub bytes: Vec<u8>,
    /// Format of `bytes`.
    pub file_type: FileType,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

/// Convert premultiplied pixels to a straight-alpha RGBA image.
///
/// # Errors
///
/// Returns an error if the pixel buffer cannot be wrapped.
pub fn to_rgba_image(pixmap: &Pixmap) -> RenderResult<image::RgbaImage> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    image::RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .ok_or_else(|| RenderError::Encode("pixel buffer size mismatch".to_string()))
}

/// Crop, resample and encode a bitmap according to `plan`.
///
/// # Errors
///
/// Returns an error if the crop lies outside the bitmap or encoding fails.
pub fn encode(bitmap: &Pixmap, plan: &ExportPlan) -> RenderResult<EncodedImage> {
    let cropped = bitmap
        .clone_rect(plan.crop)
        .ok_or_else(|| RenderError::Encode(format!("crop {:?} outside bitmap", plan.crop)))?;
    let mut rgba = to_rgba_image(&cropped)?;
    if (rgba.width(), rgba.height()) != (plan.width, plan.height) {
        rgba = image::imageops::resize(
            &rgba,
            plan.width,
            plan.height,
            image::imageops::FilterType::Triangle,
        );
    }

    let bytes = match plan.file_type {
        FileType::Png => encode_png(&rgba)?,
        FileType::Jpeg => encode_jpeg(&rgba, plan.jpeg_quality, plan.background)?,
    };
    tracing::debug!(
        file_type = %plan.file_type,
        width = plan.width,
        height = plan.height,
        bytes = bytes.len(),
        "encoded bitmap"
    );

    Ok(EncodedImage {
        bytes,
        file_type: plan.file_type,
        width: plan.width,
        height: plan.height,
    })
}

fn encode_png(rgba: &image::RgbaImage) -> RenderResult<Vec<u8>> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| RenderError::Encode(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode_jpeg(rgba: &image::RgbaImage, quality: u8, bg: [u8; 4]) -> RenderResult<Vec<u8>> {
    let mut rgb_data = Vec::with_capacity(rgba.as_raw().len() / 4 * 3);
    for pixel in rgba.as_raw().chunks_exact(4) {
        let alpha = f32::from(pixel[3]) / 255.0;
        let inv = 1.0 - alpha;
        for channel in 0..3 {
            let blended = f32::from(pixel[channel]).mul_add(alpha, f32::from(bg[channel]) * inv);
            rgb_data.push(blended.round().clamp(0.0, 255.0) as u8);
        }
    }

    let mut buf = std::io::Cursor::new(Vec::new());
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(
            &rgb_data,
            rgba.width(),
            rgba.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| RenderError::Encode(format!("JPEG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32) -> Pixmap {
        let mut pixmap = Pixmap::new(width, height).expect("pixmap");
        pixmap.fill(tiny_skia::Color::from_rgba8(10, 20, 30, 255));
        pixmap
    }

    #[test]
    fn test_plan_defaults_to_whole_surface() {
        let plan = ExportOptions::default().plan(420, 300).expect("plan");
        assert_eq!((plan.crop.x(), plan.crop.y()), (0, 0));
        assert_eq!((plan.width, plan.height), (420, 300));
        assert_eq!(plan.jpeg_quality, 100);
    }

    #[test]
    fn test_plan_clips_region() {
        let plan = ExportOptions::default()
            .with_region(Rect {
                x: 400.0,
                y: -10.0,
                width: 100.0,
                height: 20.0,
            })
            .plan(420, 300)
            .expect("plan");
        assert_eq!((plan.crop.x(), plan.crop.y()), (400, 0));
        assert_eq!((plan.width, plan.height), (20, 10));
    }

    #[test]
    fn test_plan_rejections() {
        let outside = ExportOptions::default().with_region(Rect {
            x: 500.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        });
        assert_eq!(
            outside.plan(420, 300),
            Err(ExportRequestError::EmptyRegion {
                width: 420,
                height: 300
            })
        );
        assert_eq!(
            ExportOptions::jpeg(1.5).plan(10, 10),
            Err(ExportRequestError::Quality(1.5))
        );
        assert!(ExportOptions::jpeg(f32::NAN).plan(10, 10).is_err());
        assert_eq!(
            ExportOptions::default().with_dest_size(0, 5).plan(10, 10),
            Err(ExportRequestError::ZeroDestination)
        );
    }

    #[test]
    fn test_quality_mapping() {
        assert_eq!(ExportOptions::jpeg(0.0).plan(1, 1).expect("plan").jpeg_quality, 1);
        assert_eq!(ExportOptions::jpeg(0.5).plan(1, 1).expect("plan").jpeg_quality, 50);
    }

    #[test]
    fn test_from_spec() {
        let spec = ExportSpec {
            x: Some(10.0),
            file_type: Some("jpg".to_string()),
            quality: Some(0.8),
            ..ExportSpec::default()
        };
        let options = ExportOptions::try_from(&spec).expect("options");
        assert_eq!(options.file_type, FileType::Jpeg);
        let plan = options.plan(100, 50).expect("plan");
        assert_eq!((plan.crop.x(), plan.width, plan.height), (10, 90, 50));

        let bad = ExportSpec {
            file_type: Some("gif".to_string()),
            ..ExportSpec::default()
        };
        assert!(matches!(
            ExportOptions::try_from(&bad),
            Err(ExportRequestError::FileType(name)) if name == "gif"
        ));
    }

    #[test]
    fn test_png_encode_decodes() {
        let plan = ExportOptions::png().plan(8, 4).expect("plan");
        let encoded = encode(&solid(8, 4), &plan).expect("encode");
        assert!(encoded.bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]));

        let decoded = image::load_from_memory(&encoded.bytes).expect("decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(3, 2).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_jpeg_flattens_and_resizes() {
        let transparent = Pixmap::new(16, 16).expect("pixmap");
        let plan = ExportOptions::jpeg(1.0)
            .with_dest_size(8, 8)
            .plan(16, 16)
            .expect("plan");
        let encoded = encode(&transparent, &plan).expect("encode");
        assert!(encoded.bytes.starts_with(&[0xFF, 0xD8, 0xFF]));
        assert_eq!((encoded.width, encoded.height), (8, 8));

        let decoded = image::load_from_memory(&encoded.bytes).expect("decode").to_rgb8();
        let [r, g, b] = decoded.get_pixel(4, 4).0;
        assert!(r > 245 && g > 245 && b > 245);
    }
}
