//! # Canvas Surface
//!
//! Named drawing surfaces and their asynchronous render pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │   SurfaceRegistry  (provision / context)     │
//! ├──────────────────────────────────────────────┤
//! │   Canvas handle ── DrawingContext (record)   │
//! │        │ draw / export                       │
//! │        ▼                                     │
//! │   FIFO job queue ──> SurfaceWorker           │
//! │        │ replay            │ snapshot         │
//! │        ▼                   ▼                  │
//! │   Rasterizer          encode ──> ExportSink  │
//! ├──────────────────────────────────────────────┤
//! │   ordered delivery ──> Pending / callback    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Recording never waits. A flush or export is accepted immediately and
//! reports its outcome exactly once, after the submitting call returns, in
//! the order the requests were accepted on that surface.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod pending;
pub mod registry;
pub mod script;
pub mod sink;
pub mod status;
pub mod worker;

pub use config::{PipelineConfig, ENV_BUFFER_POLICY, ENV_MISSING_IMAGES};
pub use error::{SurfaceError, SurfaceResult};
pub use pending::{Callback, Pending};
pub use registry::{Canvas, SurfaceRegistry};
pub use script::{run_script, ScriptRun};
pub use sink::{ArtifactRef, ExportSink, FsSink, MemorySink};
pub use status::{PipelineState, SurfaceStatus};
pub use worker::FlushReport;
