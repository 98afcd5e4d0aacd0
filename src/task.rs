use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

/// Identifies the pool a task draws a concurrency slot from.
///
/// `Untyped` is the pool used by tasks enqueued without any type. It is a separate
/// variant so that no configured or ad-hoc name can ever alias it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolKey {
  Untyped,
  Named(String),
}

impl PoolKey {
  pub fn named(name: impl Into<String>) -> Self {
    PoolKey::Named(name.into())
  }

  pub fn name(&self) -> Option<&str> {
    match self {
      PoolKey::Untyped => None,
      PoolKey::Named(name) => Some(name),
    }
  }
}

impl fmt::Display for PoolKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PoolKey::Untyped => f.write_str("<untyped>"),
      PoolKey::Named(name) => write!(f, "{:?}", name),
    }
  }
}

impl From<&str> for PoolKey {
  fn from(name: &str) -> Self {
    PoolKey::Named(name.to_string())
  }
}

impl From<String> for PoolKey {
  fn from(name: String) -> Self {
    PoolKey::Named(name)
  }
}

/// The set of pools a task must hold a slot in before it may start.
///
/// Built from a single name, a collection of names, or [`TaskTypes::untyped`].
/// Duplicate names collapse into one requirement. An empty collection requires no
/// pool at all, so such a task is admitted as soon as it is scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTypes(BTreeSet<PoolKey>);

impl TaskTypes {
  pub fn untyped() -> Self {
    TaskTypes(BTreeSet::from([PoolKey::Untyped]))
  }

  pub fn none() -> Self {
    TaskTypes(BTreeSet::new())
  }

  pub fn keys(&self) -> &BTreeSet<PoolKey> {
    &self.0
  }

  pub fn into_keys(self) -> BTreeSet<PoolKey> {
    self.0
  }
}

impl Default for TaskTypes {
  fn default() -> Self {
    TaskTypes::untyped()
  }
}

impl From<PoolKey> for TaskTypes {
  fn from(key: PoolKey) -> Self {
    TaskTypes(BTreeSet::from([key]))
  }
}

impl From<&str> for TaskTypes {
  fn from(name: &str) -> Self {
    PoolKey::from(name).into()
  }
}

impl From<String> for TaskTypes {
  fn from(name: String) -> Self {
    PoolKey::from(name).into()
  }
}

impl<K: Into<PoolKey>> FromIterator<K> for TaskTypes {
  fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
    TaskTypes(iter.into_iter().map(Into::into).collect())
  }
}

impl<K: Into<PoolKey>> From<Vec<K>> for TaskTypes {
  fn from(keys: Vec<K>) -> Self {
    keys.into_iter().collect()
  }
}

impl<K: Into<PoolKey>, const N: usize> From<[K; N]> for TaskTypes {
  fn from(keys: [K; N]) -> Self {
    keys.into_iter().collect()
  }
}

impl<K: Into<PoolKey> + Clone> From<&[K]> for TaskTypes {
  fn from(keys: &[K]) -> Self {
    keys.iter().cloned().collect()
  }
}

/// Lifecycle of a throttled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
  /// Queued, holding no pool slots.
  Pending,
  /// Started, holding one slot in every required pool.
  Running,
  /// Result delivered and every slot released.
  Settled,
  /// Dropped from the queue before it ever started, by an abort or because the
  /// runtime shut down. Its result is never delivered.
  Discarded,
  /// Started, but the runtime dropped it before it produced an outcome. Its slots
  /// were released; its result is never delivered.
  Abandoned,
}

/// Status shared between the scheduler and the caller's [`TaskHandle`](crate::TaskHandle).
pub(crate) type StatusCell = Arc<Mutex<TaskStatus>>;

/// Internal representation of a task waiting for admission.
///
/// `run` already carries the body and the result sender; polling it runs the body
/// and delivers the outcome, nothing more.
pub(crate) struct PendingTask {
  pub(crate) sequence: u64,
  pub(crate) pools: Arc<BTreeSet<PoolKey>>,
  pub(crate) run: BoxFuture<'static, ()>,
  pub(crate) status: StatusCell,
}

impl PendingTask {
  pub(crate) fn set_status(&self, status: TaskStatus) {
    *self.status.lock() = status;
  }
}

impl fmt::Debug for PendingTask {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PendingTask")
      .field("sequence", &self.sequence)
      .field("pools", &self.pools)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_untyped_is_distinct_from_every_name() {
    assert_ne!(PoolKey::Untyped, PoolKey::named(""));
    assert_ne!(PoolKey::Untyped, PoolKey::named("<untyped>"));
    assert_eq!(TaskTypes::default(), TaskTypes::untyped());
  }

  #[test]
  fn test_display_keeps_untyped_apart_from_names() {
    assert_eq!(PoolKey::Untyped.to_string(), "<untyped>");
    assert_eq!(PoolKey::named("foo").to_string(), "\"foo\"");
    assert_eq!(PoolKey::named("<untyped>").to_string(), "\"<untyped>\"");
  }

  #[test]
  fn test_duplicate_names_collapse() {
    let types = TaskTypes::from(["foo", "bar", "foo"]);
    assert_eq!(types.keys().len(), 2);
    assert!(types.keys().contains(&PoolKey::named("foo")));
    assert!(types.keys().contains(&PoolKey::named("bar")));
  }

  #[test]
  fn test_empty_collection_requires_nothing() {
    let types = TaskTypes::from(Vec::<String>::new());
    assert!(types.keys().is_empty());
    assert_eq!(types, TaskTypes::none());
  }

  #[test]
  fn test_single_name_conversions() {
    let expected = BTreeSet::from([PoolKey::named("foo")]);
    assert_eq!(TaskTypes::from("foo").into_keys(), expected);
    assert_eq!(TaskTypes::from("foo".to_string()).into_keys(), expected);
    assert_eq!(TaskTypes::from(&["foo"][..]).into_keys(), expected);
  }
}
