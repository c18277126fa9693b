//! Surface registry and the [`Canvas`] handle.
//!
//! A surface is provisioned with a size, which allocates its bitmap. The
//! first [`SurfaceRegistry::context`] call for that name creates the
//! drawing context and starts the surface worker; later calls hand out
//! clones of the same [`Canvas`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use canvas_core::{BufferPolicy, CanvasResult, DrawingContext, Gradient, LineJoin, PaintSource};
use canvas_renderer::{
    new_bitmap, ExportOptions, ImageProvider, Pixmap, Rasterizer, TextRasterizer,
};
use tokio::sync::{mpsc, watch};

use crate::config::PipelineConfig;
use crate::error::{SurfaceError, SurfaceResult};
use crate::pending::{Completion, Pending};
use crate::sink::{ArtifactRef, ExportSink};
use crate::status::SurfaceStatus;
use crate::worker::{FlushReport, Job, SurfaceWorker};

enum Slot {
    /// Bitmap allocated, no context yet.
    Provisioned(Pixmap),
    Active(Canvas),
}

/// Owns the named surfaces of one host.
pub struct SurfaceRegistry {
    surfaces: RwLock<HashMap<String, Slot>>,
    config: PipelineConfig,
    rasterizer: Arc<Rasterizer>,
    sink: Arc<dyn ExportSink>,
}

impl SurfaceRegistry {
    /// Create a registry whose surfaces share one image provider and sink.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        images: Arc<dyn ImageProvider>,
        sink: Arc<dyn ExportSink>,
    ) -> Self {
        let text = TextRasterizer::new(&config.text);
        let rasterizer = Rasterizer::new(images, text).with_missing_images(config.missing_images);
        Self {
            surfaces: RwLock::new(HashMap::new()),
            config,
            rasterizer: Arc::new(rasterizer),
            sink,
        }
    }

    /// Pipeline configuration in effect.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Acquire a `width` x `height` pixel target under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::SurfaceExists`] if the name is taken, or a
    /// render error if the bitmap cannot be allocated.
    pub fn provision(&self, name: &str, width: u32, height: u32) -> SurfaceResult<()> {
        let mut surfaces = self.surfaces.write().unwrap_or_else(PoisonError::into_inner);
        if surfaces.contains_key(name) {
            return Err(SurfaceError::SurfaceExists(name.to_string()));
        }
        let bitmap = new_bitmap(width, height)?;
        surfaces.insert(name.to_string(), Slot::Provisioned(bitmap));
        tracing::debug!(surface = name, width, height, "surface provisioned");
        Ok(())
    }

    /// Whether `name` is provisioned.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.surfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// The drawing handle for `name`, created on first reference.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownSurface`] if `name` was never provisioned.
    ///
    /// # Panics
    ///
    /// The first call for a surface spawns its worker and must happen
    /// inside a Tokio runtime.
    pub fn context(&self, name: &str) -> SurfaceResult<Canvas> {
        if let Some(Slot::Active(canvas)) = self
            .surfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(canvas.clone());
        }

        let mut surfaces = self.surfaces.write().unwrap_or_else(PoisonError::into_inner);
        let slot = surfaces
            .remove(name)
            .ok_or_else(|| SurfaceError::UnknownSurface(name.to_string()))?;
        let canvas = match slot {
            Slot::Active(canvas) => canvas,
            Slot::Provisioned(bitmap) => self.activate(name, bitmap),
        };
        surfaces.insert(name.to_string(), Slot::Active(canvas.clone()));
        Ok(canvas)
    }

    fn activate(&self, name: &str, bitmap: Pixmap) -> Canvas {
        let (width, height) = (bitmap.width(), bitmap.height());
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SurfaceStatus::default());

        let worker = SurfaceWorker {
            surface: name.to_string(),
            bitmap: Arc::new(bitmap),
            rendered: false,
            rasterizer: Arc::clone(&self.rasterizer),
            sink: Arc::clone(&self.sink),
            blocking_raster: self.config.blocking_raster,
            status: Arc::new(status_tx),
            jobs: jobs_rx,
        };
        tokio::spawn(worker.run());

        Canvas {
            inner: Arc::new(CanvasInner {
                name: name.to_string(),
                width,
                height,
                policy: self.config.buffer_policy,
                context: Mutex::new(DrawingContext::new(name)),
                jobs: jobs_tx,
                status: status_rx,
                flushes: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Destroy a surface: its context, worker and bitmap.
    ///
    /// Requests already queued still complete; later ones fail with
    /// [`SurfaceError::SurfaceClosed`]. Returns whether the surface existed.
    pub fn teardown(&self, name: &str) -> bool {
        let slot = self
            .surfaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        match slot {
            Some(Slot::Active(canvas)) => {
                canvas.close();
                tracing::debug!(surface = name, "surface torn down");
                true
            }
            Some(Slot::Provisioned(_)) => true,
            None => false,
        }
    }

    /// Names of all provisioned surfaces.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .surfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for SurfaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceRegistry")
            .field("surfaces", &self.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct CanvasInner {
    name: String,
    width: u32,
    height: u32,
    policy: BufferPolicy,
    context: Mutex<DrawingContext>,
    jobs: mpsc::UnboundedSender<Job>,
    status: watch::Receiver<SurfaceStatus>,
    flushes: AtomicU64,
    closed: AtomicBool,
}

/// Cloneable handle to one surface: its drawing context and pipeline.
///
/// Recording is synchronous. [`Canvas::draw`] and [`Canvas::export`] queue
/// work on the surface's FIFO and return immediately.
#[derive(Clone)]
pub struct Canvas {
    inner: Arc<CanvasInner>,
}

impl Canvas {
    /// Surface name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Surface size in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.inner.width, self.inner.height)
    }

    fn lock(&self) -> MutexGuard<'_, DrawingContext> {
        self.inner
            .context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the drawing context.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut DrawingContext) -> R) -> R {
        f(&mut self.lock())
    }

    /// See [`DrawingContext::set_fill_style`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unparseable colour.
    pub fn set_fill_style<'a>(&self, paint: impl Into<PaintSource<'a>>) -> CanvasResult<()> {
        self.lock().set_fill_style(paint)
    }

    /// See [`DrawingContext::set_stroke_style`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unparseable colour.
    pub fn set_stroke_style<'a>(&self, paint: impl Into<PaintSource<'a>>) -> CanvasResult<()> {
        self.lock().set_stroke_style(paint)
    }

    /// See [`DrawingContext::set_line_width`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive width.
    pub fn set_line_width(&self, width: f32) -> CanvasResult<()> {
        self.lock().set_line_width(width)
    }

    /// See [`DrawingContext::set_line_join`].
    pub fn set_line_join(&self, join: LineJoin) {
        self.lock().set_line_join(join);
    }

    /// See [`DrawingContext::set_font_size`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive size.
    pub fn set_font_size(&self, size: f32) -> CanvasResult<()> {
        self.lock().set_font_size(size)
    }

    /// See [`DrawingContext::create_linear_gradient`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-finite endpoint.
    pub fn create_linear_gradient(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> CanvasResult<Gradient> {
        self.lock().create_linear_gradient(x0, y0, x1, y1)
    }

    /// See [`DrawingContext::fill_rect`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-finite geometry.
    pub fn fill_rect(&self, x: f32, y: f32, width: f32, height: f32) -> CanvasResult<()> {
        self.lock().fill_rect(x, y, width, height)
    }

    /// See [`DrawingContext::stroke_rect`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-finite geometry.
    pub fn stroke_rect(&self, x: f32, y: f32, width: f32, height: f32) -> CanvasResult<()> {
        self.lock().stroke_rect(x, y, width, height)
    }

    /// See [`DrawingContext::fill_text`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-finite geometry or a bad max width.
    pub fn fill_text(&self, text: &str, x: f32, y: f32, max_width: Option<f32>) -> CanvasResult<()> {
        self.lock().fill_text(text, x, y, max_width)
    }

    /// See [`DrawingContext::draw_image_scaled`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-finite geometry or an empty id.
    pub fn draw_image_scaled(
        &self,
        image: &str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> CanvasResult<()> {
        self.lock().draw_image_scaled(image, x, y, width, height)
    }

    /// Queue a flush of everything recorded so far.
    ///
    /// With `reserve_previous` the new commands draw over the current
    /// bitmap; otherwise the bitmap is cleared first.
    pub fn draw(&self, reserve_previous: bool) -> Pending<FlushReport> {
        let (done, pending) = Pending::channel(&self.inner.name);
        self.submit_flush(reserve_previous, done);
        pending
    }

    /// Callback form of [`Canvas::draw`]. `on_complete` runs exactly once,
    /// after this call returns, in the order flushes were accepted.
    pub fn draw_with<F>(&self, reserve_previous: bool, on_complete: F)
    where
        F: FnOnce(SurfaceResult<FlushReport>) + Send + 'static,
    {
        self.submit_flush(reserve_previous, Completion::Callback(Box::new(on_complete)));
    }

    /// Queue an export of the bitmap as it stands after every flush
    /// accepted before this call.
    pub fn export(&self, options: ExportOptions) -> Pending<ArtifactRef> {
        let (done, pending) = Pending::channel(&self.inner.name);
        self.submit(Job::Export { options, done });
        pending
    }

    /// Callback form of [`Canvas::export`].
    pub fn export_with<F>(&self, options: ExportOptions, on_complete: F)
    where
        F: FnOnce(SurfaceResult<ArtifactRef>) + Send + 'static,
    {
        self.submit(Job::Export {
            options,
            done: Completion::Callback(Box::new(on_complete)),
        });
    }

    /// Current pipeline status.
    #[must_use]
    pub fn status(&self) -> SurfaceStatus {
        self.inner.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SurfaceStatus> {
        self.inner.status.clone()
    }

    /// Whether the surface has been torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn submit_flush(&self, reserve_previous: bool, done: Completion<FlushReport>) {
        // Taking the commands and queueing the job under one lock keeps
        // queue order equal to recording order across clones.
        let mut ctx = self.lock();
        if self.is_closed() {
            drop(ctx);
            done.complete_deferred(Err(SurfaceError::SurfaceClosed(self.inner.name.clone())));
            return;
        }
        let commands = ctx.take_commands(self.inner.policy);
        let sequence = self.inner.flushes.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            surface = %self.inner.name,
            sequence,
            commands = commands.len(),
            reserve_previous,
            "flush accepted"
        );
        let job = Job::Flush {
            sequence,
            commands,
            reserve_previous,
            done,
        };
        if let Err(mpsc::error::SendError(job)) = self.inner.jobs.send(job) {
            drop(ctx);
            fail_closed(job, &self.inner.name);
        }
    }

    fn submit(&self, job: Job) {
        let guard = self.lock();
        let result = if self.is_closed() {
            Err(mpsc::error::SendError(job))
        } else {
            self.inner.jobs.send(job)
        };
        drop(guard);
        if let Err(mpsc::error::SendError(job)) = result {
            fail_closed(job, &self.inner.name);
        }
    }

    fn close(&self) {
        let _ctx = self.lock();
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            // The worker may already be gone; nothing to tell it then.
            let _ = self.inner.jobs.send(Job::Close);
        }
    }
}

fn fail_closed(job: Job, surface: &str) {
    let closed = SurfaceError::SurfaceClosed(surface.to_string());
    match job {
        Job::Flush { done, .. } => done.complete_deferred(Err(closed)),
        Job::Export { done, .. } => done.complete_deferred(Err(closed)),
        Job::Close => {}
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("name", &self.inner.name)
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
