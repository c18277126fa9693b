//! The drawing context: style setters and recording primitives for one surface.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandBuffer, DrawOp, ImageDest};
use crate::style::PaintSource;
use crate::{
    CanvasError, CanvasResult, Gradient, LineCap, LineJoin, Point, Rect, StyleState, TextAlign,
};

/// What happens to the command buffer when a flush takes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPolicy {
    /// The flush consumes the buffer; the next flush starts empty.
    #[default]
    ClearOnFlush,
    /// Commands accumulate; every flush replays all of them.
    Retain,
}

impl FromStr for BufferPolicy {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" | "clear_on_flush" => Ok(Self::ClearOnFlush),
            "retain" => Ok(Self::Retain),
            _ => Err(CanvasError::InvalidKeyword {
                kind: "buffer policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Records drawing operations for a single named surface.
///
/// Nothing here touches pixels: every primitive validates its arguments,
/// captures the current style and appends a [`Command`]. A rejected call
/// returns an error and leaves both style and buffer unchanged.
#[derive(Debug, Clone)]
pub struct DrawingContext {
    surface: String,
    style: StyleState,
    saved: Vec<StyleState>,
    snapshot: Option<Arc<StyleState>>,
    buffer: CommandBuffer,
}

impl DrawingContext {
    /// Create an empty context for a surface.
    #[must_use]
    pub fn new(surface: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            style: StyleState::default(),
            saved: Vec::new(),
            snapshot: None,
            buffer: CommandBuffer::new(),
        }
    }

    /// Name of the surface this context draws to.
    #[must_use]
    pub fn surface(&self) -> &str {
        &self.surface
    }

    /// The live style state.
    #[must_use]
    pub fn style(&self) -> &StyleState {
        &self.style
    }

    /// The recorded commands.
    #[must_use]
    pub fn buffer(&self) -> &CommandBuffer {
        &self.buffer
    }

    // --- Style ---

    /// Select the fill paint.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidColor`] for an unparsable paint string.
    pub fn set_fill_style<'a>(&mut self, paint: impl Into<PaintSource<'a>>) -> CanvasResult<()> {
        let paint = self.checked("setFillStyle", paint.into().resolve())?;
        self.mutate_style(|s| s.fill = paint);
        Ok(())
    }

    /// Select the stroke paint.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidColor`] for an unparsable paint string.
    pub fn set_stroke_style<'a>(
        &mut self,
        paint: impl Into<PaintSource<'a>>,
    ) -> CanvasResult<()> {
        let paint = self.checked("setStrokeStyle", paint.into().resolve())?;
        self.mutate_style(|s| s.stroke = paint);
        Ok(())
    }

    /// Set the stroke width.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidLineWidth`] unless `width` is positive and finite.
    pub fn set_line_width(&mut self, width: f32) -> CanvasResult<()> {
        let mut next = self.style.clone();
        self.checked("setLineWidth", next.set_line_width(width))?;
        self.replace_style(next);
        Ok(())
    }

    /// Set the stroke join style.
    pub fn set_line_join(&mut self, join: LineJoin) {
        self.mutate_style(|s| s.line_join = join);
    }

    /// Set the stroke cap style.
    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.mutate_style(|s| s.line_cap = cap);
    }

    /// Set the font size in pixels.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidFontSize`] unless `size` is positive and finite.
    pub fn set_font_size(&mut self, size: f32) -> CanvasResult<()> {
        let mut next = self.style.clone();
        self.checked("setFontSize", next.set_font_size(size))?;
        self.replace_style(next);
        Ok(())
    }

    /// Set the font family used for text.
    pub fn set_font_family(&mut self, family: impl Into<String>) {
        let family = family.into();
        self.mutate_style(|s| s.font_family = family);
    }

    /// Set horizontal text anchoring.
    pub fn set_text_align(&mut self, align: TextAlign) {
        self.mutate_style(|s| s.text_align = align);
    }

    /// Set the opacity applied to every subsequent command.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidGlobalAlpha`] unless `alpha` is within `[0, 1]`.
    pub fn set_global_alpha(&mut self, alpha: f32) -> CanvasResult<()> {
        let mut next = self.style.clone();
        self.checked("setGlobalAlpha", next.set_global_alpha(alpha))?;
        self.replace_style(next);
        Ok(())
    }

    /// Push the current style onto the save stack.
    pub fn save(&mut self) {
        self.saved.push(self.style.clone());
    }

    /// Pop the save stack. Does nothing if the stack is empty.
    pub fn restore(&mut self) {
        if let Some(style) = self.saved.pop() {
            self.replace_style(style);
        }
    }

    /// Create a linear gradient along `(x0, y0) -> (x1, y1)`.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NonFiniteGeometry`] for a non-finite endpoint.
    pub fn create_linear_gradient(
        &self,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
    ) -> CanvasResult<Gradient> {
        self.checked("createLinearGradient", Gradient::linear(x0, y0, x1, y1))
    }

    // --- Primitives ---

    /// Record a filled rectangle. Negative extents are legal.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NonFiniteGeometry`] for non-finite input.
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> CanvasResult<()> {
        let rect = self.checked("fillRect", Rect::new(x, y, width, height))?;
        self.record(DrawOp::FillRect(rect));
        Ok(())
    }

    /// Record a stroked rectangle. Negative extents are legal.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NonFiniteGeometry`] for non-finite input.
    pub fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> CanvasResult<()> {
        let rect = self.checked("strokeRect", Rect::new(x, y, width, height))?;
        self.record(DrawOp::StrokeRect(rect));
        Ok(())
    }

    /// Record clearing a rectangle to transparent.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NonFiniteGeometry`] for non-finite input.
    pub fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> CanvasResult<()> {
        let rect = self.checked("clearRect", Rect::new(x, y, width, height))?;
        self.record(DrawOp::ClearRect(rect));
        Ok(())
    }

    /// Record one line of filled text with its baseline at `y`.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NonFiniteGeometry`] or [`CanvasError::InvalidMaxWidth`].
    pub fn fill_text(
        &mut self,
        text: impl Into<String>,
        x: f32,
        y: f32,
        max_width: Option<f32>,
    ) -> CanvasResult<()> {
        let checked = Point::new(x, y).and_then(|_| match max_width {
            Some(w) if !(w.is_finite() && w > 0.0) => Err(CanvasError::InvalidMaxWidth(w)),
            _ => Ok(()),
        });
        self.checked("fillText", checked)?;
        self.record(DrawOp::FillText {
            text: text.into(),
            x,
            y,
            max_width,
        });
        Ok(())
    }

    /// Record an image drawn at its natural size with its top-left at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::EmptyImageId`] or [`CanvasError::NonFiniteGeometry`].
    pub fn draw_image(&mut self, image: &str, x: f32, y: f32) -> CanvasResult<()> {
        let dest = self.checked("drawImage", check_image_id(image).and(Point::new(x, y)))?;
        self.record_image(image, None, ImageDest::At(dest));
        Ok(())
    }

    /// Record an image scaled into `(x, y, width, height)`.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::EmptyImageId`] or [`CanvasError::NonFiniteGeometry`].
    pub fn draw_image_scaled(
        &mut self,
        image: &str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> CanvasResult<()> {
        let dest = self.checked(
            "drawImage",
            check_image_id(image).and(Rect::new(x, y, width, height)),
        )?;
        self.record_image(image, None, ImageDest::Scaled(dest));
        Ok(())
    }

    /// Record the `source` region of an image scaled into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::EmptyImageId`] or [`CanvasError::NonFiniteGeometry`].
    pub fn draw_image_cropped(&mut self, image: &str, source: Rect, dest: Rect) -> CanvasResult<()> {
        let checked = check_image_id(image)
            .and(Rect::new(source.x, source.y, source.width, source.height))
            .and(Rect::new(dest.x, dest.y, dest.width, dest.height));
        let dest = self.checked("drawImage", checked)?;
        self.record_image(image, Some(source), ImageDest::Scaled(dest));
        Ok(())
    }

    // --- Buffer ---

    /// Hand the entire buffered sequence to a flush.
    ///
    /// With [`BufferPolicy::ClearOnFlush`] the buffer is emptied; with
    /// [`BufferPolicy::Retain`] it keeps growing across flushes.
    #[must_use]
    pub fn take_commands(&mut self, policy: BufferPolicy) -> Arc<[Command]> {
        match policy {
            BufferPolicy::ClearOnFlush => self.buffer.drain(),
            BufferPolicy::Retain => self.buffer.snapshot(),
        }
    }

    /// Drop every buffered command without rendering.
    pub fn discard_commands(&mut self) {
        self.buffer.clear();
    }

    // --- Internals ---

    fn record_image(&mut self, image: &str, source: Option<Rect>, dest: ImageDest) {
        self.record(DrawOp::DrawImage {
            image: image.to_string(),
            source,
            dest,
        });
    }

    fn record(&mut self, op: DrawOp) {
        tracing::trace!(surface = %self.surface, op = op.name(), "record");
        let style = self.current_snapshot();
        self.buffer.push(Command { op, style });
    }

    fn current_snapshot(&mut self) -> Arc<StyleState> {
        Arc::clone(
            self.snapshot
                .get_or_insert_with(|| Arc::new(self.style.clone())),
        )
    }

    fn mutate_style(&mut self, f: impl FnOnce(&mut StyleState)) {
        f(&mut self.style);
        self.snapshot = None;
    }

    fn replace_style(&mut self, style: StyleState) {
        self.style = style;
        self.snapshot = None;
    }

    fn checked<T>(&self, op: &'static str, result: CanvasResult<T>) -> CanvasResult<T> {
        if let Err(ref e) = result {
            tracing::warn!(surface = %self.surface, op, error = %e, "rejected drawing call");
        }
        result
    }
}

fn check_image_id(image: &str) -> CanvasResult<()> {
    if image.trim().is_empty() {
        Err(CanvasError::EmptyImageId)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, Paint};

    fn fill_color(cmd: &Command) -> Color {
        match &cmd.style.fill {
            Paint::Color(c) => *c,
            Paint::Gradient(_) => panic!("expected color fill"),
        }
    }

    #[test]
    fn test_later_style_changes_do_not_affect_recorded_commands() {
        let mut ctx = DrawingContext::new("share-canvas");
        ctx.set_fill_style("red").expect("red");
        ctx.fill_rect(0.0, 0.0, 10.0, 10.0).expect("rect");
        ctx.set_fill_style("blue").expect("blue");
        ctx.fill_rect(10.0, 0.0, 10.0, 10.0).expect("rect");

        let cmds: Vec<_> = ctx.buffer().iter().collect();
        assert_eq!(fill_color(cmds[0]), Color::parse("red").expect("red"));
        assert_eq!(fill_color(cmds[1]), Color::parse("blue").expect("blue"));
    }

    #[test]
    fn test_unchanged_style_shares_snapshot() {
        let mut ctx = DrawingContext::new("s");
        ctx.fill_rect(0.0, 0.0, 1.0, 1.0).expect("rect");
        ctx.stroke_rect(0.0, 0.0, 1.0, 1.0).expect("rect");
        ctx.set_line_width(3.0).expect("width");
        ctx.stroke_rect(0.0, 0.0, 1.0, 1.0).expect("rect");

        let cmds: Vec<_> = ctx.buffer().iter().collect();
        assert!(Arc::ptr_eq(&cmds[0].style, &cmds[1].style));
        assert!(!Arc::ptr_eq(&cmds[1].style, &cmds[2].style));
        assert_eq!(cmds[2].style.line_width, 3.0);
    }

    #[test]
    fn test_invalid_calls_are_noops() {
        let mut ctx = DrawingContext::new("s");
        assert!(ctx.set_line_width(-1.0).is_err());
        assert!(ctx.set_fill_style("rgb(300,0,0)").is_err());
        assert!(ctx.fill_rect(f32::NAN, 0.0, 1.0, 1.0).is_err());
        assert!(ctx.fill_text("x", 0.0, 0.0, Some(0.0)).is_err());
        assert!(ctx.draw_image("", 0.0, 0.0).is_err());
        assert!(ctx.buffer().is_empty());
        assert_eq!(ctx.style(), &StyleState::default());

        // Still usable afterwards.
        ctx.fill_rect(0.0, 0.0, 1.0, 1.0).expect("rect");
        assert_eq!(ctx.buffer().len(), 1);
    }

    #[test]
    fn test_negative_extent_is_recorded_verbatim() {
        let mut ctx = DrawingContext::new("s");
        ctx.fill_rect(10.0, 10.0, -5.0, -5.0).expect("flipped rect");
        let cmd = ctx.buffer().iter().next().expect("command");
        assert_eq!(
            cmd.op,
            DrawOp::FillRect(Rect {
                x: 10.0,
                y: 10.0,
                width: -5.0,
                height: -5.0
            })
        );
    }

    #[test]
    fn test_gradient_is_shared_not_copied() {
        let mut ctx = DrawingContext::new("s");
        let mut g = ctx
            .create_linear_gradient(0.0, 50.0, 0.0, 210.0)
            .expect("gradient");
        g.add_color_stop(0.0, "Black").expect("stop");
        ctx.set_fill_style(&g).expect("gradient fill");
        ctx.fill_rect(0.0, 50.0, 420.0, 210.0).expect("rect");
        ctx.fill_rect(0.0, 0.0, 1.0, 1.0).expect("rect");

        let cmds: Vec<_> = ctx.buffer().iter().collect();
        match (&cmds[0].style.fill, &cmds[1].style.fill) {
            (Paint::Gradient(a), Paint::Gradient(b)) => {
                assert!(a.ptr_eq(&g));
                assert!(a.ptr_eq(b));
            }
            _ => panic!("expected gradient fills"),
        }
    }

    #[test]
    fn test_save_restore() {
        let mut ctx = DrawingContext::new("s");
        ctx.set_line_width(2.0).expect("width");
        ctx.save();
        ctx.set_line_width(8.0).expect("width");
        ctx.restore();
        assert_eq!(ctx.style().line_width, 2.0);
        ctx.restore();
        assert_eq!(ctx.style().line_width, 2.0);
    }

    #[test]
    fn test_take_commands_policy() {
        let mut ctx = DrawingContext::new("s");
        ctx.fill_rect(0.0, 0.0, 1.0, 1.0).expect("rect");
        assert_eq!(ctx.take_commands(BufferPolicy::Retain).len(), 1);
        assert_eq!(ctx.buffer().len(), 1);
        assert_eq!(ctx.take_commands(BufferPolicy::ClearOnFlush).len(), 1);
        assert!(ctx.buffer().is_empty());
    }

    #[test]
    fn test_buffer_policy_parse() {
        assert_eq!(
            "retain".parse::<BufferPolicy>().expect("policy"),
            BufferPolicy::Retain
        );
        assert_eq!(
            "clear".parse::<BufferPolicy>().expect("policy"),
            BufferPolicy::ClearOnFlush
        );
        assert!("sometimes".parse::<BufferPolicy>().is_err());
    }
}
