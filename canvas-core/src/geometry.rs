//! Surface-local geometry primitives.

use serde::{Deserialize, Serialize};

use crate::{CanvasError, CanvasResult};

/// A point in surface-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate (pixels from left).
    pub x: f32,
    /// Y coordinate (pixels from top).
    pub y: f32,
}

impl Point {
    /// Create a point, rejecting non-finite coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NonFiniteGeometry`] if either coordinate is NaN or infinite.
    pub fn new(x: f32, y: f32) -> CanvasResult<Self> {
        ensure_finite("x", x)?;
        ensure_finite("y", y)?;
        Ok(Self { x, y })
    }
}

/// An axis-aligned rectangle as recorded by the caller.
///
/// Width and height may be negative; such a rectangle extends left/up from
/// its origin and covers the same pixels as its [`normalized`](Self::normalized) form.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// X of the origin corner.
    pub x: f32,
    /// Y of the origin corner.
    pub y: f32,
    /// Signed width.
    pub width: f32,
    /// Signed height.
    pub height: f32,
}

impl Rect {
    /// Create a rectangle, rejecting non-finite components.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NonFiniteGeometry`] naming the first bad component.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> CanvasResult<Self> {
        ensure_finite("x", x)?;
        ensure_finite("y", y)?;
        ensure_finite("width", width)?;
        ensure_finite("height", height)?;
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// The equivalent rectangle with non-negative extent.
    #[must_use]
    pub fn normalized(self) -> Self {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Left edge of the normalized rectangle.
    #[must_use]
    pub fn left(self) -> f32 {
        self.x.min(self.x + self.width)
    }

    /// Top edge of the normalized rectangle.
    #[must_use]
    pub fn top(self) -> f32 {
        self.y.min(self.y + self.height)
    }

    /// Right edge of the normalized rectangle.
    #[must_use]
    pub fn right(self) -> f32 {
        self.x.max(self.x + self.width)
    }

    /// Bottom edge of the normalized rectangle.
    #[must_use]
    pub fn bottom(self) -> f32 {
        self.y.max(self.y + self.height)
    }

    /// Whether the rectangle covers no area.
    #[must_use]
    pub fn is_empty(self) -> bool {
        !(self.width.abs() > 0.0 && self.height.abs() > 0.0)
    }

    /// Intersection with another rectangle, both taken normalized.
    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > left && bottom > top).then(|| Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }
}

/// Reject NaN and infinities for a named parameter.
///
/// # Errors
///
/// Returns [`CanvasError::NonFiniteGeometry`] when `value` is not finite.
pub fn ensure_finite(name: &'static str, value: f32) -> CanvasResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CanvasError::NonFiniteGeometry { name, value })
    }
}
