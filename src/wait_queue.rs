use crate::task::PendingTask;

use std::collections::VecDeque;
use std::mem;

/// Pending tasks in ascending sequence order.
///
/// Unlike a plain FIFO, admission may remove any member: a scan walks the whole
/// queue once, oldest first, and pulls out every task the caller accepts while
/// the rest keep their relative order.
#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
  tasks: VecDeque<PendingTask>,
}

impl WaitQueue {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn push(&mut self, task: PendingTask) {
    debug_assert!(
      self.tasks.back().map_or(true, |last| last.sequence < task.sequence),
      "tasks must be queued in sequence order"
    );
    self.tasks.push_back(task);
  }

  pub(crate) fn len(&self) -> usize {
    self.tasks.len()
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  /// Single skip-scan pass. `admit` is asked once per queued task, oldest first;
  /// it must perform the reservation itself when it returns `true`. A refused task
  /// stays in place and the walk carries on past it.
  pub(crate) fn take_admissible<F>(&mut self, mut admit: F) -> Vec<PendingTask>
  where
    F: FnMut(&PendingTask) -> bool,
  {
    let mut admitted = Vec::new();
    let mut still_waiting = VecDeque::with_capacity(self.tasks.len());

    while let Some(task) = self.tasks.pop_front() {
      if admit(&task) {
        admitted.push(task);
      } else {
        still_waiting.push_back(task);
      }
    }

    self.tasks = still_waiting;
    admitted
  }

  /// Empties the queue in one step.
  pub(crate) fn take_all(&mut self) -> VecDeque<PendingTask> {
    mem::take(&mut self.tasks)
  }
}
