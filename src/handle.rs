use crate::error::ThrottleError;
use crate::task::{PoolKey, StatusCell, TaskStatus};

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing;

/// A handle to a task enqueued on a [`Throttler`](crate::Throttler).
///
/// Dropping the handle does not affect the task; it still runs once admitted and
/// its result is discarded.
#[derive(Debug)]
pub struct TaskHandle<R: Send + 'static> {
  pub(crate) task_id: u64,
  pub(crate) pools: Arc<BTreeSet<PoolKey>>,
  pub(crate) status: StatusCell,
  pub(crate) result_receiver: oneshot::Receiver<Result<R, ThrottleError>>,
}

impl<R: Send + 'static> TaskHandle<R> {
  /// Returns the task's arrival sequence number, unique within its throttler.
  pub fn id(&self) -> u64 {
    self.task_id
  }

  /// Returns the pools this task holds a slot in while running.
  pub fn pools(&self) -> &BTreeSet<PoolKey> {
    &self.pools
  }

  pub fn status(&self) -> TaskStatus {
    *self.status.lock()
  }

  /// Awaits the task's outcome.
  ///
  /// Resolves with whatever the body produced, or `ThrottleError::TaskPanicked` if it
  /// panicked. A task discarded by [`Throttler::abort`](crate::Throttler::abort) never
  /// produces a result, so for such a task this future stays pending forever; use
  /// [`status`](Self::status) or a timeout if that matters to the caller.
  pub async fn await_result(self) -> Result<R, ThrottleError> {
    match self.result_receiver.await {
      Ok(outcome) => outcome,
      Err(_) => {
        // Sender dropped without a value: the task left the queue without running.
        tracing::trace!(task_id = %self.task_id, "Task was discarded before running; its result will never settle.");
        std::future::pending().await
      }
    }
  }
}

/// Completes once every task that was running when [`Throttler::abort`](crate::Throttler::abort)
/// was called has settled.
#[derive(Debug)]
#[must_use = "a DrainHandle does nothing unless awaited"]
pub struct DrainHandle {
  pub(crate) receiver: Option<oneshot::Receiver<()>>,
}

impl DrainHandle {
  pub(crate) fn ready() -> Self {
    Self { receiver: None }
  }

  pub(crate) fn waiting(receiver: oneshot::Receiver<()>) -> Self {
    Self {
      receiver: Some(receiver),
    }
  }

  /// Non-blocking check whether the drain already finished.
  pub fn is_drained(&mut self) -> bool {
    let drained = match self.receiver.as_mut() {
      None => return true,
      Some(receiver) => !matches!(receiver.try_recv(), Err(oneshot::error::TryRecvError::Empty)),
    };
    if drained {
      self.receiver = None;
    }
    drained
  }
}

impl Future for DrainHandle {
  type Output = ();

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    let ready = match self.receiver.as_mut() {
      None => return Poll::Ready(()),
      // A closed channel means the throttler went away with nothing left to wait for.
      Some(receiver) => Pin::new(receiver).poll(cx).is_ready(),
    };
    if ready {
      self.receiver = None;
      Poll::Ready(())
    } else {
      Poll::Pending
    }
  }
}
