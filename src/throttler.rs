use crate::config::ThrottlerConfig;
use crate::executor;
use crate::handle::{DrainHandle, TaskHandle};
use crate::pool::{PoolRegistry, PoolSnapshot};
use crate::task::{PendingTask, PoolKey, StatusCell, TaskStatus, TaskTypes};
use crate::wait_queue::WaitQueue;

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

struct RunningTask {
  pools: Arc<BTreeSet<PoolKey>>,
  status: StatusCell,
}

/// An outstanding `abort` waiting for the tasks that were running at the time.
struct PendingDrain {
  waiting_on: HashSet<u64>,
  notify: oneshot::Sender<()>,
}

/// Everything the scheduler mutates. Only ever touched under `ThrottlerInner::state`.
struct SchedulerState {
  next_sequence: u64,
  registry: PoolRegistry,
  queue: WaitQueue,
  running: HashMap<u64, RunningTask>,
  drains: Vec<PendingDrain>,
}

impl SchedulerState {
  /// One skip-scan over the queue. Returns the admitted tasks, already holding their
  /// slots and recorded as running.
  fn scan(&mut self) -> Vec<PendingTask> {
    if self.queue.is_empty() {
      return Vec::new();
    }
    let registry = &mut self.registry;
    let admitted = self.queue.take_admissible(|task| registry.try_reserve_all(&task.pools));

    for task in &admitted {
      task.set_status(TaskStatus::Running);
      self.running.insert(
        task.sequence,
        RunningTask {
          pools: task.pools.clone(),
          status: task.status.clone(),
        },
      );
    }
    admitted
  }

  /// Returns a running task's slots. `status` is its final state: `Settled` once the
  /// outcome went out, `Abandoned` when the runtime dropped it first.
  fn release(&mut self, sequence: u64, status: TaskStatus) {
    let Some(task) = self.running.remove(&sequence) else {
      warn!(task_id = %sequence, "Release requested for a task that is not running.");
      return;
    };
    self.registry.release_all(&task.pools);
    *task.status.lock() = status;

    for mut drain in mem::take(&mut self.drains) {
      drain.waiting_on.remove(&sequence);
      if drain.waiting_on.is_empty() {
        let _ = drain.notify.send(());
      } else {
        self.drains.push(drain);
      }
    }
  }
}

pub(crate) struct ThrottlerInner {
  pub(crate) name: Arc<String>,
  pub(crate) tokio_handle: TokioHandle,
  state: Mutex<SchedulerState>,
}

impl ThrottlerInner {
  /// Releases a finished task's slots and rescans. The caller spawns the result.
  pub(crate) fn settle(&self, sequence: u64) -> Vec<PendingTask> {
    let mut state = self.state.lock();
    state.release(sequence, TaskStatus::Settled);
    let admitted = state.scan();
    debug!(
      throttler = %*self.name,
      task_id = %sequence,
      admitted = admitted.len(),
      still_queued = state.queue.len(),
      "Task settled, pools released."
    );
    admitted
  }

  /// Releases a task the runtime dropped before it delivered an outcome and empties
  /// the queue without rescanning. The caller drops the returned tasks after the
  /// lock is gone.
  pub(crate) fn abandon(&self, sequence: u64) -> VecDeque<PendingTask> {
    let mut state = self.state.lock();
    state.release(sequence, TaskStatus::Abandoned);
    let discarded = state.queue.take_all();
    for task in &discarded {
      task.set_status(TaskStatus::Discarded);
    }
    warn!(
      throttler = %*self.name,
      task_id = %sequence,
      discarded = discarded.len(),
      "Task dropped by the runtime before settling; discarding the queue."
    );
    discarded
  }
}

/// A consistent view of a throttler, taken in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottlerSnapshot {
  pub pools: Vec<PoolSnapshot>,
  /// Running tasks with the pools each one holds, ordered by task id.
  pub running: Vec<(u64, BTreeSet<PoolKey>)>,
  pub queued: usize,
}

/// Bounds how many futures run at once, per named pool.
///
/// Every task names the pools it needs (see [`TaskTypes`]) and starts only once it
/// can take one slot in each of them at the same time. Whenever a task is enqueued
/// or settles, the queue is walked oldest first and every task that fits is
/// started; a task that does not fit is skipped, never blocking the ones behind it.
///
/// Cloning a `Throttler` yields another handle to the same pools and queue.
#[derive(Clone)]
pub struct Throttler {
  inner: Arc<ThrottlerInner>,
}

impl Throttler {
  pub fn new(config: ThrottlerConfig, tokio_handle: TokioHandle, name: &str) -> Self {
    if config.default_capacity == 0 {
      warn!(throttler = %name, "Default capacity is 0: tasks on unconfigured pools will never start.");
    }
    for (pool, capacity) in &config.type_capacities {
      if *capacity == 0 {
        warn!(throttler = %name, %pool, "Pool capacity is 0: tasks requiring it will never start.");
      }
    }

    Self {
      inner: Arc::new(ThrottlerInner {
        name: Arc::new(name.to_string()),
        tokio_handle,
        state: Mutex::new(SchedulerState {
          next_sequence: 0,
          registry: PoolRegistry::new(config),
          queue: WaitQueue::new(),
          running: HashMap::new(),
          drains: Vec::new(),
        }),
      }),
    }
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  /// Number of tasks waiting for admission.
  pub fn queued_task_count(&self) -> usize {
    self.inner.state.lock().queue.len()
  }

  /// Number of tasks currently holding pool slots.
  pub fn running_task_count(&self) -> usize {
    self.inner.state.lock().running.len()
  }

  /// Bookkeeping for one pool, or `None` if no task has referenced it yet.
  pub fn pool(&self, key: &PoolKey) -> Option<PoolSnapshot> {
    self.inner.state.lock().registry.snapshot(key)
  }

  /// Bookkeeping for every pool created so far, ordered by key.
  pub fn pools(&self) -> Vec<PoolSnapshot> {
    self.inner.state.lock().registry.snapshots()
  }

  /// Pools, running tasks and queue length, all read under the same lock.
  pub fn snapshot(&self) -> ThrottlerSnapshot {
    let state = self.inner.state.lock();
    let mut running: Vec<(u64, BTreeSet<PoolKey>)> = state
      .running
      .iter()
      .map(|(sequence, task)| (*sequence, (*task.pools).clone()))
      .collect();
    running.sort_by_key(|(sequence, _)| *sequence);
    ThrottlerSnapshot {
      pools: state.registry.snapshots(),
      running,
      queued: state.queue.len(),
    }
  }

  /// Enqueues a task on the untyped pool.
  pub fn enqueue<F, Fut, R>(&self, body: F) -> TaskHandle<R>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
  {
    self.enqueue_with_types(TaskTypes::untyped(), body)
  }

  /// Enqueues a task that must hold a slot in every pool of `types` while it runs.
  ///
  /// The task may start before this returns. `body` is called on the runtime, never
  /// on the caller's stack.
  pub fn enqueue_with_types<T, F, Fut, R>(&self, types: T, body: F) -> TaskHandle<R>
  where
    T: Into<TaskTypes>,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
  {
    let pools = Arc::new(types.into().into_keys());
    let status: StatusCell = Arc::new(Mutex::new(TaskStatus::Pending));
    let (result_tx, result_rx) = oneshot::channel();

    let (task_id, admitted) = {
      let mut state = self.inner.state.lock();
      let sequence = state.next_sequence;
      state.next_sequence += 1;

      state.queue.push(PendingTask {
        sequence,
        pools: pools.clone(),
        run: executor::prepare(sequence, body, result_tx),
        status: status.clone(),
      });
      debug!(throttler = %*self.inner.name, task_id = %sequence, pools = ?pools, "Task enqueued.");

      let admitted = state.scan();
      trace!(
        throttler = %*self.inner.name,
        admitted = admitted.len(),
        still_queued = state.queue.len(),
        "Scan after enqueue."
      );
      (sequence, admitted)
    };

    executor::spawn_admitted(&self.inner, admitted);

    TaskHandle {
      task_id,
      pools,
      status,
      result_receiver: result_rx,
    }
  }

  /// Enqueues a synchronous body. It runs inside a spawned task once admitted.
  pub fn enqueue_sync<T, F, R>(&self, types: T, body: F) -> TaskHandle<R>
  where
    T: Into<TaskTypes>,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
  {
    self.enqueue_with_types(types, move || std::future::ready(body()))
  }

  /// Discards every queued task and returns a handle that completes once all
  /// currently running tasks have settled.
  ///
  /// Discarded tasks never deliver a result. Running tasks are not interrupted.
  /// The throttler stays usable: tasks enqueued afterwards are scheduled as usual,
  /// and they do not delay the returned handle.
  pub fn abort(&self) -> DrainHandle {
    let (discarded, drain) = {
      let mut state = self.inner.state.lock();
      let discarded = state.queue.take_all();
      for task in &discarded {
        task.set_status(TaskStatus::Discarded);
      }

      let waiting_on: HashSet<u64> = state.running.keys().copied().collect();
      info!(
        throttler = %*self.inner.name,
        discarded = discarded.len(),
        running = waiting_on.len(),
        "Abort: queue cleared, waiting for running tasks."
      );

      let drain = if waiting_on.is_empty() {
        DrainHandle::ready()
      } else {
        let (notify, receiver) = oneshot::channel();
        state.drains.push(PendingDrain { waiting_on, notify });
        DrainHandle::waiting(receiver)
      };
      (discarded, drain)
    };

    drop(discarded);
    drain
  }
}

impl std::fmt::Debug for Throttler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = self.inner.state.lock();
    f.debug_struct("Throttler")
      .field("name", &self.inner.name)
      .field("queued", &state.queue.len())
      .field("running", &state.running.len())
      .finish_non_exhaustive()
  }
}
