//! Tuning knobs for profile extraction.

use serde::{Deserialize, Serialize};

/// Configuration shared by the controller and its requests.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
  /// Cumulative accepted points before the controller asks live requests
  /// to finish their current level and stop refining.
  pub threshold: usize,

  /// Leading-edge debounce window for recompute, milliseconds.
  pub debounce_ms: u64,

  /// Loaded nodes promoted to filtering per `update` tick.
  pub max_nodes_per_update: usize,

  /// Cooperative filter budget per tick, milliseconds. The filter yields
  /// once a probe sees more than this much elapsed time.
  pub filter_yield_budget_ms: f64,

  /// Points per projected output batch.
  pub batch_capacity: usize,

  /// Deepest octree level a request will serve.
  pub max_depth: u32,
}

impl ProfileConfig {
  pub const DEFAULT: Self = Self {
    threshold: 60_000,
    debounce_ms: 100,
    max_nodes_per_update: 1,
    filter_yield_budget_ms: 4.0,
    batch_capacity: 10_000,
    max_depth: u32::MAX,
  };
}

impl Default for ProfileConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}
