//! Infinite plane in Hessian normal form.

use glam::DVec3;

/// Plane defined by a unit normal and a signed constant, so that
/// `signed_distance(p) = normal . p + d`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
  /// Unit normal.
  pub normal: DVec3,
  /// Signed offset from the origin along the normal.
  pub d: f64,
}

impl Plane {
  /// Plane through `point` with the given normal. The normal is normalized.
  pub fn from_normal_and_point(normal: DVec3, point: DVec3) -> Self {
    let normal = normal.normalize();
    Self {
      normal,
      d: -normal.dot(point),
    }
  }

  /// Signed distance from a point to the plane. Positive on the normal side.
  #[inline]
  pub fn signed_distance(&self, point: DVec3) -> f64 {
    self.normal.dot(point) + self.d
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn signed_distance_both_sides() {
    let plane = Plane::from_normal_and_point(DVec3::Z, DVec3::new(5.0, 5.0, 2.0));
    assert!((plane.signed_distance(DVec3::new(0.0, 0.0, 5.0)) - 3.0).abs() < 1e-12);
    assert!((plane.signed_distance(DVec3::new(9.0, 1.0, -1.0)) + 3.0).abs() < 1e-12);
  }

  #[test]
  fn normalizes_input_normal() {
    let plane = Plane::from_normal_and_point(DVec3::new(0.0, 10.0, 0.0), DVec3::ZERO);
    assert!((plane.normal.length() - 1.0).abs() < 1e-12);
    assert!((plane.signed_distance(DVec3::new(0.0, 4.0, 0.0)) - 4.0).abs() < 1e-12);
  }
}
