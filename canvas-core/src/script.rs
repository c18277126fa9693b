//! JSON draw scripts.
//!
//! A script is a serializable transcript of calls against one surface, so a
//! host can ship a whole drawing session across a process boundary:
//!
//! ```json
//! {
//!   "surface": "share-canvas", "width": 420, "height": 300,
//!   "steps": [
//!     { "op": "setFillStyle", "paint": "rgb(179,179,179)" },
//!     { "op": "fillRect", "x": 0, "y": 0, "width": 420, "height": 40 },
//!     { "op": "draw", "reserve": false },
//!     { "op": "export", "fileType": "png" }
//!   ]
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    CanvasError, CanvasResult, DrawingContext, Gradient, LineCap, LineJoin, Rect, TextAlign,
};

/// A paint reference inside a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaintSpec {
    /// A color string.
    Css(String),
    /// A gradient created earlier in the script.
    Gradient {
        /// Script-local gradient id.
        gradient: String,
    },
}

/// Export parameters as written in a script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSpec {
    /// Crop origin x.
    #[serde(default)]
    pub x: Option<f32>,
    /// Crop origin y.
    #[serde(default)]
    pub y: Option<f32>,
    /// Crop width.
    #[serde(default)]
    pub width: Option<f32>,
    /// Crop height.
    #[serde(default)]
    pub height: Option<f32>,
    /// Output width in pixels.
    #[serde(default)]
    pub dest_width: Option<u32>,
    /// Output height in pixels.
    #[serde(default)]
    pub dest_height: Option<u32>,
    /// `"png"` or `"jpg"`.
    #[serde(default)]
    pub file_type: Option<String>,
    /// Encoding quality in `[0, 1]`, used for JPEG.
    #[serde(default)]
    pub quality: Option<f32>,
}

/// One scripted call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum Step {
    SetFillStyle {
        paint: PaintSpec,
    },
    SetStrokeStyle {
        paint: PaintSpec,
    },
    SetLineWidth {
        width: f32,
    },
    SetLineJoin {
        join: LineJoin,
    },
    SetLineCap {
        cap: LineCap,
    },
    SetFontSize {
        size: f32,
    },
    SetFontFamily {
        family: String,
    },
    SetTextAlign {
        align: TextAlign,
    },
    SetGlobalAlpha {
        alpha: f32,
    },
    Save,
    Restore,
    CreateLinearGradient {
        id: String,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
    },
    AddColorStop {
        gradient: String,
        offset: f32,
        color: String,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    StrokeRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    ClearRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    FillText {
        text: String,
        x: f32,
        y: f32,
        #[serde(default, rename = "maxWidth")]
        max_width: Option<f32>,
    },
    DrawImage {
        image: String,
        x: f32,
        y: f32,
        #[serde(default)]
        width: Option<f32>,
        #[serde(default)]
        height: Option<f32>,
        #[serde(default)]
        source: Option<Rect>,
    },
    /// Flush the buffer; `reserve` keeps previously rendered pixels.
    Draw {
        #[serde(default)]
        reserve: bool,
    },
    /// Export the surface bitmap.
    Export(ExportSpec),
}

/// A step that must be carried out by the render pipeline rather than the context.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStep {
    /// Flush with the given `reserve_previous`.
    Draw {
        /// Keep pixels from earlier flushes.
        reserve: bool,
    },
    /// Export with these parameters.
    Export(ExportSpec),
}

/// A whole drawing session for one surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Surface name.
    pub surface: String,
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Calls in order.
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse a script from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Serialization`] on malformed JSON or unknown ops.
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        serde_json::from_str(json).map_err(CanvasError::Serialization)
    }

    /// Serialize the script to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Serialization`] if serialization fails.
    pub fn to_json(&self) -> CanvasResult<String> {
        serde_json::to_string_pretty(self).map_err(CanvasError::Serialization)
    }
}

/// A rejected step and why.
#[derive(Debug)]
pub struct StepError {
    /// Index of the step in the script.
    pub index: usize,
    /// The validation error.
    pub error: CanvasError,
}

/// Validation failures collected while replaying a script.
#[derive(Debug, Default)]
pub struct ScriptReport {
    /// Every rejected step, in order.
    pub errors: Vec<StepError>,
}

impl ScriptReport {
    /// Whether every step was accepted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Applies script steps to a [`DrawingContext`], tracking named gradients.
#[derive(Debug, Default)]
pub struct ScriptRecorder {
    gradients: HashMap<String, Gradient>,
    report: ScriptReport,
}

impl ScriptRecorder {
    /// Create a recorder with no gradients.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one step.
    ///
    /// Recording steps return `None`; `draw`/`export` are returned untouched
    /// for the caller to run. A rejected step is logged in the report and
    /// returns `None`, so replay can continue.
    pub fn apply(
        &mut self,
        ctx: &mut DrawingContext,
        index: usize,
        step: &Step,
    ) -> Option<PipelineStep> {
        match self.try_apply(ctx, step) {
            Ok(next) => next,
            Err(error) => {
                self.report.errors.push(StepError { index, error });
                None
            }
        }
    }

    /// Validation failures so far.
    #[must_use]
    pub fn report(&self) -> &ScriptReport {
        &self.report
    }

    /// Consume the recorder, returning its report.
    #[must_use]
    pub fn into_report(self) -> ScriptReport {
        self.report
    }

    fn paint<'a>(&self, spec: &'a PaintSpec) -> CanvasResult<crate::style::PaintSource<'a>> {
        match spec {
            PaintSpec::Css(s) => Ok(s.as_str().into()),
            PaintSpec::Gradient { gradient } => self
                .gradients
                .get(gradient)
                .map(Into::into)
                .ok_or_else(|| CanvasError::UnknownGradient(gradient.clone())),
        }
    }

    fn try_apply(
        &mut self,
        ctx: &mut DrawingContext,
        step: &Step,
    ) -> CanvasResult<Option<PipelineStep>> {
        match step {
            Step::SetFillStyle { paint } => ctx.set_fill_style(self.paint(paint)?)?,
            Step::SetStrokeStyle { paint } => ctx.set_stroke_style(self.paint(paint)?)?,
            Step::SetLineWidth { width } => ctx.set_line_width(*width)?,
            Step::SetLineJoin { join } => ctx.set_line_join(*join),
            Step::SetLineCap { cap } => ctx.set_line_cap(*cap),
            Step::SetFontSize { size } => ctx.set_font_size(*size)?,
            Step::SetFontFamily { family } => ctx.set_font_family(family.clone()),
            Step::SetTextAlign { align } => ctx.set_text_align(*align),
            Step::SetGlobalAlpha { alpha } => ctx.set_global_alpha(*alpha)?,
            Step::Save => ctx.save(),
            Step::Restore => ctx.restore(),
            Step::CreateLinearGradient { id, x0, y0, x1, y1 } => {
                let gradient = ctx.create_linear_gradient(*x0, *y0, *x1, *y1)?;
                self.gradients.insert(id.clone(), gradient);
            }
            Step::AddColorStop {
                gradient,
                offset,
                color,
            } => {
                self.gradients
                    .get_mut(gradient)
                    .ok_or_else(|| CanvasError::UnknownGradient(gradient.clone()))?
                    .add_color_stop(*offset, color)?;
            }
            Step::FillRect {
                x,
                y,
                width,
                height,
            } => ctx.fill_rect(*x, *y, *width, *height)?,
            Step::StrokeRect {
                x,
                y,
                width,
                height,
            } => ctx.stroke_rect(*x, *y, *width, *height)?,
            Step::ClearRect {
                x,
                y,
                width,
                height,
            } => ctx.clear_rect(*x, *y, *width, *height)?,
            Step::FillText {
                text,
                x,
                y,
                max_width,
            } => ctx.fill_text(text.clone(), *x, *y, *max_width)?,
            Step::DrawImage {
                image,
                x,
                y,
                width,
                height,
                source,
            } => match (source, width, height) {
                (Some(src), Some(w), Some(h)) => {
                    ctx.draw_image_cropped(image, *src, Rect::new(*x, *y, *w, *h)?)?;
                }
                (Some(src), None, None) => {
                    ctx.draw_image_cropped(image, *src, Rect::new(*x, *y, src.width, src.height)?)?;
                }
                (None, Some(w), Some(h)) => ctx.draw_image_scaled(image, *x, *y, *w, *h)?,
                (None, None, None) => ctx.draw_image(image, *x, *y)?,
                (_, Some(_), None) => return Err(CanvasError::PartialImageSize("width")),
                (_, None, Some(_)) => return Err(CanvasError::PartialImageSize("height")),
            },
            Step::Draw { reserve } => return Ok(Some(PipelineStep::Draw { reserve: *reserve })),
            Step::Export(spec) => return Ok(Some(PipelineStep::Export(spec.clone()))),
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DrawOp, ImageDest, Paint};

    const SHARE_CARD: &str = r##"{
        "surface": "share-canvas",
        "width": 420,
        "height": 300,
        "steps": [
            { "op": "setFontSize", "size": 20 },
            { "op": "setFillStyle", "paint": "rgb(179,179,179)" },
            { "op": "fillText", "text": "test", "x": 0, "y": 20, "maxWidth": 420 },
            { "op": "drawImage", "image": "img", "x": 0, "y": 50, "width": 420, "height": 210 },
            { "op": "createLinearGradient", "id": "g", "x0": 0, "y0": 50, "x1": 0, "y1": 210 },
            { "op": "addColorStop", "gradient": "g", "offset": 0, "color": "Black" },
            { "op": "addColorStop", "gradient": "g", "offset": 0.5, "color": "#abcdef" },
            { "op": "addColorStop", "gradient": "g", "offset": 1, "color": "rgba(0,0,0,0.4)" },
            { "op": "setFillStyle", "paint": { "gradient": "g" } },
            { "op": "fillRect", "x": 0, "y": 50, "width": 420, "height": 210 },
            { "op": "setStrokeStyle", "paint": "#fff" },
            { "op": "setLineJoin", "join": "round" },
            { "op": "setLineWidth", "width": 6 },
            { "op": "strokeRect", "x": 20, "y": 198, "width": 76, "height": 76 },
            { "op": "drawImage", "image": "abc", "x": 20, "y": 198, "width": 76, "height": 76 },
            { "op": "draw", "reserve": false },
            { "op": "export", "quality": 1 }
        ]
    }"##;

    #[test]
    fn test_share_card_script_replays() {
        let script = Script::from_json(SHARE_CARD).expect("parse");
        let mut ctx = DrawingContext::new(script.surface.clone());
        let mut recorder = ScriptRecorder::new();

        let pipeline: Vec<_> = script
            .steps
            .iter()
            .enumerate()
            .filter_map(|(i, step)| recorder.apply(&mut ctx, i, step))
            .collect();

        assert!(recorder.report().is_clean(), "{:?}", recorder.report());
        assert_eq!(ctx.buffer().len(), 5);
        assert_eq!(pipeline[0], PipelineStep::Draw { reserve: false });
        assert!(matches!(pipeline[1], PipelineStep::Export(ref e) if e.quality == Some(1.0)));

        let cmds: Vec<_> = ctx.buffer().iter().collect();
        assert!(matches!(cmds[0].op, DrawOp::FillText { max_width: Some(w), .. } if w == 420.0));
        assert_eq!(cmds[0].style.font_size, 20.0);
        match &cmds[2].style.fill {
            Paint::Gradient(g) => assert_eq!(g.stops().len(), 3),
            Paint::Color(_) => panic!("gradient fill expected"),
        }
        assert_eq!(cmds[3].style.line_width, 6.0);
    }

    #[test]
    fn test_bad_steps_are_reported_and_skipped() {
        let script = Script::from_json(
            r#"{ "surface": "s", "width": 10, "height": 10, "steps": [
                { "op": "setLineWidth", "width": -3 },
                { "op": "setFillStyle", "paint": { "gradient": "missing" } },
                { "op": "fillRect", "x": 0, "y": 0, "width": 5, "height": 5 }
            ]}"#,
        )
        .expect("parse");
        let mut ctx = DrawingContext::new("s");
        let mut recorder = ScriptRecorder::new();
        for (i, step) in script.steps.iter().enumerate() {
            recorder.apply(&mut ctx, i, step);
        }
        let report = recorder.into_report();
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].index, 0);
        assert!(matches!(
            report.errors[1].error,
            CanvasError::UnknownGradient(_)
        ));
        assert_eq!(ctx.buffer().len(), 1);
    }

    #[test]
    fn test_draw_image_size_forms() {
        let script = Script::from_json(
            r#"{ "surface": "s", "width": 100, "height": 100, "steps": [
                { "op": "drawImage", "image": "a", "x": 10, "y": 20,
                  "source": { "x": 5, "y": 5, "width": 2, "height": 3 } },
                { "op": "drawImage", "image": "a", "x": 0, "y": 0, "width": 40 },
                { "op": "drawImage", "image": "a", "x": 0, "y": 0, "height": 40,
                  "source": { "x": 0, "y": 0, "width": 1, "height": 1 } }
            ]}"#,
        )
        .expect("parse");
        let mut ctx = DrawingContext::new("s");
        let mut recorder = ScriptRecorder::new();
        for (i, step) in script.steps.iter().enumerate() {
            recorder.apply(&mut ctx, i, step);
        }

        let cmds: Vec<_> = ctx.buffer().iter().collect();
        assert_eq!(cmds.len(), 1);
        match &cmds[0].op {
            DrawOp::DrawImage { source, dest, .. } => {
                let src = source.expect("crop");
                assert_eq!((src.x, src.y, src.width, src.height), (5.0, 5.0, 2.0, 3.0));
                assert_eq!(
                    *dest,
                    ImageDest::Scaled(Rect::new(10.0, 20.0, 2.0, 3.0).expect("rect"))
                );
            }
            other => panic!("image expected, got {other:?}"),
        }

        let report = recorder.into_report();
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].index, 1);
        assert!(matches!(
            report.errors[0].error,
            CanvasError::PartialImageSize("width")
        ));
        assert!(matches!(
            report.errors[1].error,
            CanvasError::PartialImageSize("height")
        ));
    }

    #[test]
    fn test_unknown_op_is_a_parse_error() {
        let err = Script::from_json(
            r#"{ "surface": "s", "width": 1, "height": 1, "steps": [{ "op": "arc" }] }"#,
        )
        .expect_err("unknown op");
        assert!(matches!(err, CanvasError::Serialization(_)));
    }
}
