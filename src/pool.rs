use crate::config::ThrottlerConfig;
use crate::task::PoolKey;

use std::collections::{BTreeSet, HashMap};

/// Point-in-time view of one pool's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
  pub key: PoolKey,
  pub capacity: usize,
  pub used: usize,
}

#[derive(Debug)]
pub(crate) struct Pool {
  capacity: usize,
  used: usize,
}

impl Pool {
  fn has_room(&self) -> bool {
    self.used < self.capacity
  }
}

/// Owns every pool of one throttler. Pools come into existence the first time a
/// key is referenced and keep their capacity for the registry's lifetime.
#[derive(Debug)]
pub(crate) struct PoolRegistry {
  config: ThrottlerConfig,
  pools: HashMap<PoolKey, Pool>,
}

impl PoolRegistry {
  pub(crate) fn new(config: ThrottlerConfig) -> Self {
    Self {
      config,
      pools: HashMap::new(),
    }
  }

  fn resolve(&mut self, key: &PoolKey) -> &mut Pool {
    let config = &self.config;
    self.pools.entry(key.clone()).or_insert_with(|| {
      let capacity = config.capacity_for(key);
      tracing::trace!(pool = %key, capacity, "Creating pool on first reference.");
      Pool { capacity, used: 0 }
    })
  }

  /// Takes one slot in every pool of `keys`, or in none of them.
  pub(crate) fn try_reserve_all(&mut self, keys: &BTreeSet<PoolKey>) -> bool {
    for key in keys {
      let has_room = match self.pools.get(key) {
        Some(pool) => pool.has_room(),
        None => self.resolve(key).has_room(),
      };
      if !has_room {
        return false;
      }
    }
    for key in keys {
      self.resolve(key).used += 1;
    }
    true
  }

  /// Gives back the slots taken by a matching `try_reserve_all`.
  pub(crate) fn release_all(&mut self, keys: &BTreeSet<PoolKey>) {
    for key in keys {
      let pool = self.resolve(key);
      debug_assert!(pool.used > 0, "releasing pool {} with no slot in use", key);
      pool.used = pool.used.saturating_sub(1);
    }
  }

  pub(crate) fn snapshot(&self, key: &PoolKey) -> Option<PoolSnapshot> {
    self.pools.get(key).map(|pool| PoolSnapshot {
      key: key.clone(),
      capacity: pool.capacity,
      used: pool.used,
    })
  }

  pub(crate) fn snapshots(&self) -> Vec<PoolSnapshot> {
    let mut all: Vec<PoolSnapshot> = self
      .pools
      .iter()
      .map(|(key, pool)| PoolSnapshot {
        key: key.clone(),
        capacity: pool.capacity,
        used: pool.used,
      })
      .collect();
    all.sort_by(|a, b| a.key.cmp(&b.key));
    all
  }
}
