//! Linear gradients shared by reference between style state and commands.

use std::sync::Arc;

use crate::{CanvasError, CanvasResult, Color, Point};

/// A single color stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// Position along the axis in `[0, 1]`.
    pub offset: f32,
    /// Color at this position.
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
struct GradientData {
    start: Point,
    end: Point,
    stops: Vec<GradientStop>,
}

/// A linear gradient paint source.
///
/// Cloning is cheap and shares the stop list. Adding a stop to a gradient
/// that is already referenced elsewhere (by a recorded command, say) detaches
/// this handle first, so earlier holders keep the stops they saw.
#[derive(Debug, Clone)]
pub struct Gradient {
    data: Arc<GradientData>,
}

impl Gradient {
    /// Create a gradient along the axis `(x0, y0) -> (x1, y1)` with no stops.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NonFiniteGeometry`] for a non-finite endpoint.
    pub fn linear(x0: f32, y0: f32, x1: f32, y1: f32) -> CanvasResult<Self> {
        let start = Point::new(x0, y0)?;
        let end = Point::new(x1, y1)?;
        Ok(Self {
            data: Arc::new(GradientData {
                start,
                end,
                stops: Vec::new(),
            }),
        })
    }

    /// Axis start point.
    #[must_use]
    pub fn start(&self) -> Point {
        self.data.start
    }

    /// Axis end point.
    #[must_use]
    pub fn end(&self) -> Point {
        self.data.end
    }

    /// Stops in insertion order.
    #[must_use]
    pub fn stops(&self) -> &[GradientStop] {
        &self.data.stops
    }

    /// Append a stop whose color is given as a paint string.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidStopOffset`] or [`CanvasError::InvalidColor`];
    /// the gradient is unchanged in either case.
    pub fn add_color_stop(&mut self, offset: f32, color: &str) -> CanvasResult<()> {
        check_offset(offset)?;
        let color = Color::parse(color)?;
        self.add_stop(offset, color)
    }

    /// Append a stop with an already-parsed color.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidStopOffset`] if `offset` is outside `[0, 1]`.
    pub fn add_stop(&mut self, offset: f32, color: Color) -> CanvasResult<()> {
        check_offset(offset)?;
        Arc::make_mut(&mut self.data)
            .stops
            .push(GradientStop { offset, color });
        Ok(())
    }

    /// Whether two handles share the same stop list.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Identity of the shared stop list, stable while any handle is alive.
    #[must_use]
    pub fn key(&self) -> usize {
        Arc::as_ptr(&self.data) as usize
    }

    /// Sort the stops and precompute the axis for repeated sampling.
    #[must_use]
    pub fn prepare(&self) -> PreparedGradient {
        let mut stops = self.data.stops.clone();
        // Stable, so equal offsets keep insertion order.
        stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));

        // f64 so that huge but finite axes do not overflow to infinity.
        let (x0, y0) = (f64::from(self.data.start.x), f64::from(self.data.start.y));
        let dx = f64::from(self.data.end.x) - x0;
        let dy = f64::from(self.data.end.y) - y0;
        PreparedGradient {
            x0,
            y0,
            dx,
            dy,
            len_sq: dx * dx + dy * dy,
            stops,
        }
    }

    /// Color at parametric position `t` along the axis.
    ///
    /// Returns `None` when the gradient has no stops.
    #[must_use]
    pub fn color_at(&self, t: f32) -> Option<Color> {
        self.prepare().color_at(t)
    }

    /// Color at a surface point, projected onto the axis.
    ///
    /// Returns `None` when there are no stops or the axis has zero length.
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> Option<Color> {
        self.prepare().sample(x, y)
    }
}

impl PartialEq for Gradient {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.data == other.data
    }
}

fn check_offset(offset: f32) -> CanvasResult<()> {
    if offset.is_finite() && (0.0..=1.0).contains(&offset) {
        Ok(())
    } else {
        Err(CanvasError::InvalidStopOffset(offset))
    }
}

/// A gradient with sorted stops, ready for per-pixel sampling.
#[derive(Debug, Clone)]
pub struct PreparedGradient {
    x0: f64,
    y0: f64,
    dx: f64,
    dy: f64,
    len_sq: f64,
    stops: Vec<GradientStop>,
}

impl PreparedGradient {
    /// Whether sampling can ever produce a color.
    #[must_use]
    pub fn is_paintable(&self) -> bool {
        !self.stops.is_empty() && self.len_sq > 0.0
    }

    /// Parametric position of a point projected onto the axis.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn project(&self, x: f32, y: f32) -> f32 {
        let along = (f64::from(x) - self.x0) * self.dx + (f64::from(y) - self.y0) * self.dy;
        (along / self.len_sq) as f32
    }

    /// Color at parametric position `t`.
    ///
    /// Before the first stop clamps to the first stop, past the last clamps to
    /// the last. At an offset held by several stops the last inserted wins;
    /// between offsets the two nearest distinct stops are interpolated. A
    /// non-finite `t` resolves to the first stop.
    #[must_use]
    pub fn color_at(&self, t: f32) -> Option<Color> {
        let first = self.stops.first()?;
        if !t.is_finite() || t < first.offset {
            return Some(first.color);
        }

        let upper = self.stops.partition_point(|s| s.offset <= t);
        let lower = &self.stops[upper - 1];
        if upper == self.stops.len() || lower.offset == t {
            return Some(lower.color);
        }

        let hi = &self.stops[upper];
        let frac = (t - lower.offset) / (hi.offset - lower.offset);
        Some(lower.color.lerp(hi.color, frac))
    }

    /// Color at a surface point.
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> Option<Color> {
        if self.len_sq <= 0.0 {
            return None;
        }
        self.color_at(self.project(x, y))
    }
}
