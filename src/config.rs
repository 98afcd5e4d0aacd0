use crate::task::PoolKey;

use std::collections::HashMap;

/// Capacity used for every pool without an explicit entry when no default is given.
pub const DEFAULT_CAPACITY: usize = 10;

/// Pool capacities for a [`Throttler`](crate::Throttler).
///
/// Capacities are fixed once a throttler is built. A capacity of zero is legal and
/// keeps that pool permanently full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottlerConfig {
  pub default_capacity: usize,
  pub type_capacities: HashMap<String, usize>,
}

impl ThrottlerConfig {
  pub fn new(default_capacity: usize) -> Self {
    Self {
      default_capacity,
      type_capacities: HashMap::new(),
    }
  }

  pub fn with_type_capacity(mut self, name: impl Into<String>, capacity: usize) -> Self {
    self.type_capacities.insert(name.into(), capacity);
    self
  }

  pub fn with_type_capacities<I, S>(mut self, capacities: I) -> Self
  where
    I: IntoIterator<Item = (S, usize)>,
    S: Into<String>,
  {
    self
      .type_capacities
      .extend(capacities.into_iter().map(|(name, capacity)| (name.into(), capacity)));
    self
  }

  /// Explicit capacity for a named pool, otherwise the default. The untyped pool
  /// always uses the default.
  pub fn capacity_for(&self, key: &PoolKey) -> usize {
    match key {
      PoolKey::Untyped => self.default_capacity,
      PoolKey::Named(name) => self.type_capacities.get(name).copied().unwrap_or(self.default_capacity),
    }
  }
}

impl Default for ThrottlerConfig {
  fn default() -> Self {
    Self::new(DEFAULT_CAPACITY)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_capacity_resolution() {
    let config = ThrottlerConfig::new(1).with_type_capacity("foo", 2).with_type_capacities([("bar", 3)]);

    assert_eq!(config.capacity_for(&PoolKey::Untyped), 1);
    assert_eq!(config.capacity_for(&PoolKey::named("foo")), 2);
    assert_eq!(config.capacity_for(&PoolKey::named("bar")), 3);
    assert_eq!(config.capacity_for(&PoolKey::named("unknown")), 1);
  }

  #[test]
  fn test_default_config() {
    let config = ThrottlerConfig::default();
    assert_eq!(config.default_capacity, DEFAULT_CAPACITY);
    assert!(config.type_capacities.is_empty());
  }
}
