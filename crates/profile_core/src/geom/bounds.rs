//! Axis-aligned bounding box, double precision.

use glam::DVec3;

/// Double-precision axis-aligned bounding box.
///
/// Starts inverted (`EMPTY`) so it can accumulate points or child boxes
/// without a sentinel flag; an empty box unions as the identity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb3 {
  /// Minimum corner (inclusive).
  pub min: DVec3,
  /// Maximum corner (inclusive).
  pub max: DVec3,
}

impl Aabb3 {
  /// Inverted box, ready for accumulation.
  pub const EMPTY: Self = Self {
    min: DVec3::INFINITY,
    max: DVec3::NEG_INFINITY,
  };

  /// Create a box from min and max corners.
  ///
  /// # Panics
  /// Debug-asserts that min <= max on all axes.
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(
      min.x <= max.x && min.y <= max.y && min.z <= max.z,
      "AABB min must be <= max on all axes"
    );
    Self { min, max }
  }

  /// True while no point has been accumulated.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
  }

  /// Expand to contain a point.
  #[inline]
  pub fn grow(&mut self, point: DVec3) {
    self.min = self.min.min(point);
    self.max = self.max.max(point);
  }

  /// Expand to contain another box. Empty operands are the identity.
  #[inline]
  pub fn union(&mut self, other: &Aabb3) {
    if other.is_empty() {
      return;
    }
    self.min = self.min.min(other.min);
    self.max = self.max.max(other.max);
  }

  /// Check if this box overlaps another (boundary contact counts).
  #[inline]
  pub fn overlaps(&self, other: &Aabb3) -> bool {
    self.min.x <= other.max.x
      && self.max.x >= other.min.x
      && self.min.y <= other.max.y
      && self.max.y >= other.min.y
      && self.min.z <= other.max.z
      && self.max.z >= other.min.z
  }

  /// Check if this box contains a point.
  #[inline]
  pub fn contains_point(&self, point: DVec3) -> bool {
    point.x >= self.min.x
      && point.x <= self.max.x
      && point.y >= self.min.y
      && point.y <= self.max.y
      && point.z >= self.min.z
      && point.z <= self.max.z
  }

  /// Size of the box (max - min).
  #[inline]
  pub fn size(&self) -> DVec3 {
    self.max - self.min
  }

  /// Center of the box.
  #[inline]
  pub fn center(&self) -> DVec3 {
    (self.min + self.max) * 0.5
  }
}

impl Default for Aabb3 {
  fn default() -> Self {
    Self::EMPTY
  }
}
