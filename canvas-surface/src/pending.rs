//! Completion plumbing for flush and export requests.
//!
//! Every request completes exactly once, either through a [`Pending`]
//! future or through a callback, never from inside the call that
//! submitted it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{SurfaceError, SurfaceResult};

/// Boxed single-use completion callback.
pub type Callback<T> = Box<dyn FnOnce(SurfaceResult<T>) + Send + 'static>;

/// Future resolving to the outcome of a queued request.
///
/// Dropping it does not cancel the request.
#[must_use = "a pending request reports its outcome only when awaited"]
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<SurfaceResult<T>>,
    surface: String,
}

impl<T> Pending<T> {
    pub(crate) fn channel(surface: &str) -> (Completion<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            Completion::Ticket(tx),
            Self {
                rx,
                surface: surface.to_string(),
            },
        )
    }
}

impl<T> Future for Pending<T> {
    type Output = SurfaceResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The worker went away without answering.
            Poll::Ready(Err(_)) => Poll::Ready(Err(SurfaceError::SurfaceClosed(self.surface.clone()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Where a request's outcome is delivered.
pub(crate) enum Completion<T> {
    Ticket(oneshot::Sender<SurfaceResult<T>>),
    Callback(Callback<T>),
}

impl<T: Send + 'static> Completion<T> {
    /// Deliver the outcome from a worker or task context.
    pub(crate) fn complete(self, result: SurfaceResult<T>) {
        match self {
            // The receiver may have been dropped; nobody is listening then.
            Self::Ticket(tx) => {
                let _ = tx.send(result);
            }
            Self::Callback(callback) => callback(result),
        }
    }

    /// Deliver the outcome from the submitting call itself.
    ///
    /// Callbacks are deferred to a task so they never run re-entrantly.
    pub(crate) fn complete_deferred(self, result: SurfaceResult<T>) {
        match self {
            Self::Ticket(_) => self.complete(result),
            Self::Callback(callback) => {
                tokio::spawn(async move { callback(result) });
            }
        }
    }
}
