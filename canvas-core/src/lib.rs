//! # Canvas Core
//!
//! Retained-mode 2D drawing: style state, shared gradients and an
//! append-only command buffer per named surface. Nothing in this crate
//! touches pixels; rasterization happens later, on an explicit flush.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              DrawingContext                 │
//! ├─────────────────────────────────────────────┤
//! │  Style State     │  Command Buffer          │
//! │  - fill/stroke   │  - FillRect/StrokeRect   │
//! │  - line, font    │  - FillText/DrawImage    │
//! │  - save stack    │  - style snapshot each   │
//! ├─────────────────────────────────────────────┤
//! │  Gradient (shared by reference, COW stops)  │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod color;
pub mod command;
pub mod context;
pub mod error;
pub mod geometry;
pub mod gradient;
pub mod script;
pub mod style;

pub use color::Color;
pub use command::{Command, CommandBuffer, DrawOp, ImageDest};
pub use context::{BufferPolicy, DrawingContext};
pub use error::{CanvasError, CanvasResult};
pub use geometry::{Point, Rect};
pub use gradient::{Gradient, GradientStop, PreparedGradient};
pub use script::{ExportSpec, PipelineStep, Script, ScriptRecorder, ScriptReport, Step};
pub use style::{LineCap, LineJoin, Paint, PaintSource, StyleState, TextAlign};

/// Canvas core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
