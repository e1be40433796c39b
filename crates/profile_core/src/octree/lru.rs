//! Shared node cache with touch/evict semantics.
//!
//! The profile path is a pure reader of octree data: it only calls `touch`
//! on nodes it consumes so the concurrent rendering traversal does not evict
//! the profile's working set. Capacity and eviction belong to the octree
//! side; eviction here drops the cache's strong handle, letting the payload
//! free once nothing else references the node.

use std::collections::HashMap;
use std::sync::Mutex;

use super::node::{node_id, NodeRef};

struct LruEntry {
  node: NodeRef,
  last_access: u64,
}

struct LruInner {
  entries: HashMap<usize, LruEntry>,
  tick: u64,
}

/// Least-recently-used node cache keyed by node identity.
pub struct NodeLru {
  capacity: usize,
  inner: Mutex<LruInner>,
}

impl NodeLru {
  pub fn new(capacity: usize) -> Self {
    assert!(capacity > 0, "cache capacity must be positive");
    Self {
      capacity,
      inner: Mutex::new(LruInner {
        entries: HashMap::new(),
        tick: 0,
      }),
    }
  }

  /// Mark a node as recently used, inserting it if absent. Evicts the
  /// stalest entries when over capacity.
  pub fn touch(&self, node: &NodeRef) {
    let mut inner = self.inner.lock().unwrap();
    inner.tick += 1;
    let tick = inner.tick;
    inner
      .entries
      .entry(node_id(node))
      .and_modify(|entry| entry.last_access = tick)
      .or_insert_with(|| LruEntry {
        node: node.clone(),
        last_access: tick,
      });

    while inner.entries.len() > self.capacity {
      evict_oldest(&mut inner);
    }
  }

  pub fn contains(&self, node: &NodeRef) -> bool {
    self.inner.lock().unwrap().entries.contains_key(&node_id(node))
  }

  pub fn len(&self) -> usize {
    self.inner.lock().unwrap().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn clear(&self) {
    self.inner.lock().unwrap().entries.clear();
  }
}

fn evict_oldest(inner: &mut LruInner) {
  let oldest = inner
    .entries
    .iter()
    .min_by_key(|(_, entry)| entry.last_access)
    .map(|(key, _)| *key);
  if let Some(key) = oldest {
    inner.entries.remove(&key);
  }
}
