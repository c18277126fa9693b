//! Per-surface flush worker.
//!
//! One task per surface drains a FIFO of jobs and exclusively owns the
//! committed bitmap. Flushes replay into a working copy and commit only on
//! success. Exports snapshot the committed bitmap in queue order and are
//! then encoded and persisted by their own task, so a slow sink never
//! holds up later flushes. Outcomes still reach their callers in the
//! order the requests were accepted: every completion goes through one
//! delivery task that awaits them in queue order.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use canvas_core::Command;
use canvas_renderer::{encode, new_bitmap, ExportOptions, Pixmap, Rasterizer, ReplayReport};
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, watch};

use crate::error::{SurfaceError, SurfaceResult};
use crate::pending::Completion;
use crate::sink::{ArtifactRef, ExportSink};
use crate::status::{PipelineState, SurfaceStatus};

/// Outcome of a successful flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// 1-based position of this flush among those accepted on the surface.
    pub sequence: u64,
    /// Commands replayed.
    pub commands: usize,
    /// Images skipped because they could not be resolved.
    pub skipped_images: Vec<String>,
    /// Time spent rasterizing.
    pub elapsed: Duration,
}

pub(crate) enum Job {
    Flush {
        sequence: u64,
        commands: Arc<[Command]>,
        reserve_previous: bool,
        done: Completion<FlushReport>,
    },
    Export {
        options: ExportOptions,
        done: Completion<ArtifactRef>,
    },
    Close,
}

pub(crate) struct SurfaceWorker {
    pub(crate) surface: String,
    pub(crate) bitmap: Arc<Pixmap>,
    pub(crate) rendered: bool,
    pub(crate) rasterizer: Arc<Rasterizer>,
    pub(crate) sink: Arc<dyn ExportSink>,
    pub(crate) blocking_raster: bool,
    pub(crate) status: Arc<watch::Sender<SurfaceStatus>>,
    pub(crate) jobs: mpsc::UnboundedReceiver<Job>,
}

impl SurfaceWorker {
    pub(crate) async fn run(mut self) {
        tracing::debug!(surface = %self.surface, "surface worker started");
        let (deliver, deliveries) = mpsc::unbounded_channel();
        tokio::spawn(deliver_in_order(deliveries));

        while let Some(job) = self.jobs.recv().await {
            let delivery = match job {
                Job::Flush {
                    sequence,
                    commands,
                    reserve_previous,
                    done,
                } => {
                    let result = self.flush(sequence, commands, reserve_previous).await;
                    ready(done, result)
                }
                Job::Export { options, done } => self.export(options, done),
                Job::Close => break,
            };
            // The delivery task only exits once this sender is dropped.
            let _ = deliver.send(delivery);
        }

        // Anything queued behind Close is answered rather than dropped.
        self.jobs.close();
        while let Ok(job) = self.jobs.try_recv() {
            let closed = SurfaceError::SurfaceClosed(self.surface.clone());
            let delivery = match job {
                Job::Flush { done, .. } => ready(done, Err(closed)),
                Job::Export { done, .. } => ready(done, Err(closed)),
                Job::Close => continue,
            };
            let _ = deliver.send(delivery);
        }
        tracing::debug!(surface = %self.surface, "surface worker stopped");
    }

    async fn flush(
        &mut self,
        sequence: u64,
        commands: Arc<[Command]>,
        reserve_previous: bool,
    ) -> SurfaceResult<FlushReport> {
        self.status.send_modify(|s| s.state = PipelineState::Flushing);
        let started = Instant::now();

        let outcome = self.rasterize(commands, reserve_previous).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok((bitmap, replay)) => {
                self.bitmap = Arc::new(bitmap);
                self.rendered = true;
                tracing::debug!(
                    surface = %self.surface,
                    sequence,
                    commands = replay.commands,
                    ?elapsed,
                    "flush committed"
                );
                Ok(FlushReport {
                    sequence,
                    commands: replay.commands,
                    skipped_images: replay.skipped_images,
                    elapsed,
                })
            }
            Err(error) => {
                tracing::warn!(surface = %self.surface, sequence, %error, "flush failed");
                Err(error)
            }
        };

        let committed = result.is_ok();
        self.status.send_modify(|s| {
            if committed {
                s.flushes_completed += 1;
                s.has_content = true;
            }
            s.settle();
        });
        result
    }

    async fn rasterize(
        &self,
        commands: Arc<[Command]>,
        reserve_previous: bool,
    ) -> SurfaceResult<(Pixmap, ReplayReport)> {
        let mut working = if reserve_previous {
            (*self.bitmap).clone()
        } else {
            new_bitmap(self.bitmap.width(), self.bitmap.height())?
        };

        if self.blocking_raster {
            let rasterizer = Arc::clone(&self.rasterizer);
            tokio::task::spawn_blocking(move || {
                let report = rasterizer.replay(&mut working, &commands)?;
                Ok::<_, SurfaceError>((working, report))
            })
            .await?
        } else {
            // The worker must outlive a panicking replay so the flush still resolves.
            let replay = panic::catch_unwind(AssertUnwindSafe(|| {
                self.rasterizer.replay(&mut working, &commands)
            }));
            match replay {
                Ok(report) => Ok((working, report?)),
                Err(payload) => Err(SurfaceError::Task(format!(
                    "replay panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            }
        }
    }

    fn export(&self, options: ExportOptions, done: Completion<ArtifactRef>) -> Delivery {
        if !self.rendered {
            tracing::debug!(surface = %self.surface, "export before first flush");
            return ready(done, Err(SurfaceError::NothingRendered(self.surface.clone())));
        }
        let plan = match options.plan(self.bitmap.width(), self.bitmap.height()) {
            Ok(plan) => plan,
            Err(error) => return ready(done, Err(error.into())),
        };

        let bitmap = Arc::clone(&self.bitmap);
        let sink = Arc::clone(&self.sink);
        let status = Arc::clone(&self.status);
        let surface = self.surface.clone();
        status.send_modify(|s| {
            s.pending_exports += 1;
            if s.state == PipelineState::Idle {
                s.state = PipelineState::Exporting;
            }
        });

        let work = tokio::spawn(async move {
            let result: SurfaceResult<ArtifactRef> = async {
                let encoded = tokio::task::spawn_blocking(move || encode(&bitmap, &plan)).await??;
                sink.persist(&surface, encoded).await
            }
            .await;

            match &result {
                Ok(artifact) => tracing::debug!(surface = %surface, uri = %artifact.uri, "export completed"),
                Err(error) => tracing::warn!(surface = %surface, %error, "export failed"),
            }
            status.send_modify(|s| {
                s.pending_exports -= 1;
                if s.state != PipelineState::Flushing {
                    s.settle();
                }
            });
            result
        });

        async move {
            let result = match work.await {
                Ok(result) => result,
                Err(error) => Err(error.into()),
            };
            done.complete(result);
        }
        .boxed()
    }
}

/// A completion waiting for its turn.
type Delivery = BoxFuture<'static, ()>;

fn ready<T: Send + 'static>(done: Completion<T>, result: SurfaceResult<T>) -> Delivery {
    async move { done.complete(result) }.boxed()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

async fn deliver_in_order(mut deliveries: mpsc::UnboundedReceiver<Delivery>) {
    while let Some(delivery) = deliveries.recv().await {
        delivery.await;
    }
}
