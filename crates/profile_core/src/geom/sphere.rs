//! Bounding sphere.

use glam::{DAffine3, DVec3};

use super::Aabb3;

/// Bounding sphere, double precision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
  pub center: DVec3,
  pub radius: f64,
}

impl Sphere {
  pub fn new(center: DVec3, radius: f64) -> Self {
    Self { center, radius }
  }

  /// Sphere enclosing a box: centered on it, radius half its diagonal.
  pub fn enclosing(aabb: &Aabb3) -> Self {
    Self {
      center: aabb.center(),
      radius: aabb.size().length() * 0.5,
    }
  }

  /// Transform into another space. The radius is scaled by the largest
  /// axis scale, which over-approximates under non-uniform scaling.
  pub fn transformed(&self, transform: &DAffine3) -> Self {
    let scale = transform
      .matrix3
      .x_axis
      .length()
      .max(transform.matrix3.y_axis.length())
      .max(transform.matrix3.z_axis.length());
    Self {
      center: transform.transform_point3(self.center),
      radius: self.radius * scale,
    }
  }
}
