//! Recorded drawing commands and the append-only buffer that holds them.

use std::sync::Arc;

use crate::{Point, Rect, StyleState};

/// Where an image lands on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageDest {
    /// Top-left corner; the image keeps its natural (or source-rect) size.
    At(Point),
    /// Scaled into this rectangle.
    Scaled(Rect),
}

/// The geometry and payload of a drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Fill a rectangle with the fill paint.
    FillRect(Rect),
    /// Stroke a rectangle outline with the stroke paint.
    StrokeRect(Rect),
    /// Reset a rectangle to transparent.
    ClearRect(Rect),
    /// Draw one line of text with the fill paint.
    FillText {
        /// Text to draw.
        text: String,
        /// Anchor x (see [`TextAlign`](crate::TextAlign)).
        x: f32,
        /// Baseline y.
        y: f32,
        /// Text wider than this is compressed horizontally to fit.
        max_width: Option<f32>,
    },
    /// Draw an image resolved from a logical identifier.
    DrawImage {
        /// Logical image identifier, resolved at rasterization time.
        image: String,
        /// Sub-rectangle of the image to draw, in image pixels.
        source: Option<Rect>,
        /// Placement on the surface.
        dest: ImageDest,
    },
}

impl DrawOp {
    /// Short tag used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DrawOp::FillRect(_) => "fillRect",
            DrawOp::StrokeRect(_) => "strokeRect",
            DrawOp::ClearRect(_) => "clearRect",
            DrawOp::FillText { .. } => "fillText",
            DrawOp::DrawImage { .. } => "drawImage",
        }
    }
}

/// A drawing operation together with the style it was recorded under.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// What to draw.
    pub op: DrawOp,
    /// Style snapshot taken when the command was recorded.
    pub style: Arc<StyleState>,
}

/// Ordered, append-only log of recorded commands.
///
/// Later commands paint over earlier ones.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Number of buffered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Copy of the current sequence, cheap to send to a render worker.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[Command]> {
        Arc::from(self.commands.as_slice())
    }

    /// Move the current sequence out, leaving the buffer empty.
    #[must_use]
    pub fn drain(&mut self) -> Arc<[Command]> {
        Arc::from(std::mem::take(&mut self.commands))
    }

    /// Drop all buffered commands.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl<'a> IntoIterator for &'a CommandBuffer {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
