//! Style state: the paint and line/text attributes read by drawing commands.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CanvasError, CanvasResult, Color, Gradient};

/// Default font size in pixels, matching the host platform.
pub const DEFAULT_FONT_SIZE: f32 = 10.0;

/// Default font family.
pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";

/// A selected fill or stroke paint.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    /// A solid color.
    Color(Color),
    /// A shared gradient.
    Gradient(Gradient),
}

impl Default for Paint {
    fn default() -> Self {
        Self::Color(Color::BLACK)
    }
}

/// Input accepted by the fill/stroke setters.
#[derive(Debug, Clone)]
pub enum PaintSource<'a> {
    /// A paint string in one of the accepted color notations.
    Css(&'a str),
    /// An already-built color.
    Color(Color),
    /// A gradient handle.
    Gradient(Gradient),
}

impl PaintSource<'_> {
    /// Resolve to a [`Paint`], parsing color strings.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidColor`] for an unparsable string.
    pub fn resolve(self) -> CanvasResult<Paint> {
        match self {
            PaintSource::Css(s) => Color::parse(s).map(Paint::Color),
            PaintSource::Color(c) => Ok(Paint::Color(c)),
            PaintSource::Gradient(g) => Ok(Paint::Gradient(g)),
        }
    }
}

impl<'a> From<&'a str> for PaintSource<'a> {
    fn from(s: &'a str) -> Self {
        Self::Css(s)
    }
}

impl<'a> From<&'a String> for PaintSource<'a> {
    fn from(s: &'a String) -> Self {
        Self::Css(s.as_str())
    }
}

impl From<Color> for PaintSource<'_> {
    fn from(c: Color) -> Self {
        Self::Color(c)
    }
}

impl From<Gradient> for PaintSource<'_> {
    fn from(g: Gradient) -> Self {
        Self::Gradient(g)
    }
}

impl From<&Gradient> for PaintSource<'_> {
    fn from(g: &Gradient) -> Self {
        Self::Gradient(g.clone())
    }
}

/// How stroke segments are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    /// Sharp corners.
    #[default]
    Miter,
    /// Rounded corners.
    Round,
    /// Cut-off corners.
    Bevel,
}

/// How open stroke ends are capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    /// Flat end at the endpoint.
    #[default]
    Butt,
    /// Semicircular end.
    Round,
    /// Square end extending half the line width.
    Square,
}

/// Horizontal anchoring of text relative to its x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Text starts at x.
    #[default]
    Left,
    /// Text is centered on x.
    Center,
    /// Text ends at x.
    Right,
}

macro_rules! keyword_from_str {
    ($ty:ty, $kind:literal, { $($name:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = CanvasError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(CanvasError::InvalidKeyword {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

keyword_from_str!(LineJoin, "line join", {
    "miter" => LineJoin::Miter,
    "round" => LineJoin::Round,
    "bevel" => LineJoin::Bevel,
});

keyword_from_str!(LineCap, "line cap", {
    "butt" => LineCap::Butt,
    "round" => LineCap::Round,
    "square" => LineCap::Square,
});

keyword_from_str!(TextAlign, "text align", {
    "left" => TextAlign::Left,
    "start" => TextAlign::Left,
    "center" => TextAlign::Center,
    "right" => TextAlign::Right,
    "end" => TextAlign::Right,
});

/// The full set of style attributes in effect for a command.
///
/// Commands hold an immutable snapshot of this; the context owns the live copy.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleState {
    /// Paint for fills and text.
    pub fill: Paint,
    /// Paint for strokes.
    pub stroke: Paint,
    /// Stroke width in pixels, always positive.
    pub line_width: f32,
    /// Stroke join style.
    pub line_join: LineJoin,
    /// Stroke cap style.
    pub line_cap: LineCap,
    /// Font size in pixels, always positive.
    pub font_size: f32,
    /// Font family name passed to the text rasterizer.
    pub font_family: String,
    /// Horizontal text anchoring.
    pub text_align: TextAlign,
    /// Opacity multiplier applied to every paint, in `[0, 1]`.
    pub global_alpha: f32,
}

impl Default for StyleState {
    fn default() -> Self {
        Self {
            fill: Paint::default(),
            stroke: Paint::default(),
            line_width: 1.0,
            line_join: LineJoin::default(),
            line_cap: LineCap::default(),
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            text_align: TextAlign::default(),
            global_alpha: 1.0,
        }
    }
}

impl StyleState {
    pub(crate) fn set_line_width(&mut self, width: f32) -> CanvasResult<()> {
        if !(width.is_finite() && width > 0.0) {
            return Err(CanvasError::InvalidLineWidth(width));
        }
        self.line_width = width;
        Ok(())
    }

    pub(crate) fn set_font_size(&mut self, size: f32) -> CanvasResult<()> {
        if !(size.is_finite() && size > 0.0) {
            return Err(CanvasError::InvalidFontSize(size));
        }
        self.font_size = size;
        Ok(())
    }

    pub(crate) fn set_global_alpha(&mut self, alpha: f32) -> CanvasResult<()> {
        if !(alpha.is_finite() && (0.0..=1.0).contains(&alpha)) {
            return Err(CanvasError::InvalidGlobalAlpha(alpha));
        }
        self.global_alpha = alpha;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = StyleState::default();
        assert_eq!(s.fill, Paint::Color(Color::BLACK));
        assert_eq!(s.line_width, 1.0);
        assert_eq!(s.line_join, LineJoin::Miter);
        assert_eq!(s.font_size, DEFAULT_FONT_SIZE);
        assert_eq!(s.global_alpha, 1.0);
    }

    #[test]
    fn test_keywords_parse() {
        assert_eq!("round".parse::<LineJoin>().expect("join"), LineJoin::Round);
        assert_eq!("Bevel".parse::<LineJoin>().expect("join"), LineJoin::Bevel);
        assert_eq!("square".parse::<LineCap>().expect("cap"), LineCap::Square);
        assert_eq!("end".parse::<TextAlign>().expect("align"), TextAlign::Right);
        assert!(matches!(
            "pointy".parse::<LineJoin>(),
            Err(CanvasError::InvalidKeyword { kind: "line join", .. })
        ));
    }

    #[test]
    fn test_setters_reject_out_of_domain() {
        let mut s = StyleState::default();
        assert!(s.set_line_width(-2.0).is_err());
        assert!(s.set_line_width(0.0).is_err());
        assert!(s.set_font_size(f32::NAN).is_err());
        assert!(s.set_global_alpha(1.1).is_err());
        assert_eq!(s, StyleState::default());

        s.set_line_width(6.0).expect("valid");
        assert_eq!(s.line_width, 6.0);
    }

    #[test]
    fn test_paint_source_resolution() {
        let paint = PaintSource::from("#fff").resolve().expect("white");
        assert_eq!(paint, Paint::Color(Color::WHITE));
        assert!(PaintSource::from("bogus").resolve().is_err());
    }
}
