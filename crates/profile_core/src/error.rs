//! Error kinds for the profile extraction core.
//!
//! Filter-local defects (missing geometry, failed loads) are recoverable: the
//! offending node is skipped and traversal continues. Buffer stride conflicts
//! are fatal for the owning request and surface through its cancel callback.

use crate::attributes::PointAttribute;

/// Errors produced by the profile extraction core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
  /// Two buffers disagree on elements-per-point for the same attribute.
  /// Fatal for the request that hit it.
  #[error("attribute {attribute:?} stride mismatch: expected {expected}, got {actual}")]
  StrideMismatch {
    attribute: PointAttribute,
    expected: usize,
    actual: usize,
  },

  /// A node advertises points but exposes no usable position column.
  /// The node is skipped.
  #[error("node at level {level} advertises {num_points} points but has no position column")]
  EmptyGeometry { level: u32, num_points: u32 },

  /// Fewer than two markers, or a non-positive width. Recompute is a no-op.
  #[error("profile needs at least two markers and a positive width")]
  InvalidProfile,

  /// Asynchronous node load failed. The node is skipped.
  #[error("node load failed: {0}")]
  Load(String),
}
