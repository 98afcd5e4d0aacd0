use crate::error::ThrottleError;
use crate::task::PendingTask;
use crate::throttler::ThrottlerInner;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{error, info_span, trace, warn, Instrument};

/// Wraps a task body into the future the scheduler spawns on admission.
///
/// Nothing runs until the returned future is first polled. Whatever the body does
/// (returns, panics while being called, panics while being polled) ends in exactly
/// one message on `result_tx`.
pub(crate) fn prepare<F, Fut, R>(
  task_id: u64,
  body: F,
  result_tx: oneshot::Sender<Result<R, ThrottleError>>,
) -> BoxFuture<'static, ()>
where
  F: FnOnce() -> Fut + Send + 'static,
  Fut: Future<Output = R> + Send + 'static,
  R: Send + 'static,
{
  async move {
    let outcome = match AssertUnwindSafe(async move { body().await }).catch_unwind().await {
      Ok(value) => {
        trace!(%task_id, "Task body completed.");
        Ok(value)
      }
      Err(_panic_payload) => {
        error!(%task_id, "Task panicked during execution.");
        Err(ThrottleError::TaskPanicked)
      }
    };

    if result_tx.send(outcome).is_err() {
      warn!(%task_id, "Result receiver for task was dropped. Task outcome was lost.");
    }
  }
  .boxed()
}

/// Slots held by one running task. Dropping it releases them on every exit path
/// of the spawned task.
///
/// Only a task that delivered its outcome triggers a rescan. A task dropped before
/// that means the runtime is shutting down (or already gone), so the backlog is
/// discarded instead of being handed to a runtime that would drop it straight away.
struct Reservation {
  inner: Arc<ThrottlerInner>,
  sequence: u64,
  delivered: bool,
}

impl Drop for Reservation {
  fn drop(&mut self) {
    if self.delivered {
      let admitted = self.inner.settle(self.sequence);
      spawn_admitted(&self.inner, admitted);
    } else {
      let discarded = self.inner.abandon(self.sequence);
      drop(discarded);
    }
  }
}

/// Starts tasks the scheduler just admitted. Must be called without holding the
/// scheduler lock.
pub(crate) fn spawn_admitted(inner: &Arc<ThrottlerInner>, admitted: Vec<PendingTask>) {
  for task in admitted {
    let mut reservation = Reservation {
      inner: inner.clone(),
      sequence: task.sequence,
      delivered: false,
    };
    let span = info_span!("throttled_task", throttler = %*inner.name, task_id = task.sequence);
    let run = task.run;

    inner.tokio_handle.spawn(
      async move {
        run.await;
        reservation.delivered = true;
      }
      .instrument(span),
    );
  }
}
