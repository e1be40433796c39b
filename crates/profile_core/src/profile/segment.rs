//! One segment of the profile polyline with its derived corridor geometry.

use glam::DVec3;

use crate::buffer::TypedPointBuffer;
use crate::geom::{Plane, Sphere};

/// Derived geometry for one marker pair.
///
/// `side` is the ground-projected segment direction; `forward` is its
/// horizontal normal. The cut plane contains the segment line and bounds the
/// corridor laterally; the half plane passes through the segment midpoint
/// and bounds it longitudinally.
#[derive(Clone, Debug)]
pub struct Segment {
  pub start: DVec3,
  pub end: DVec3,
  /// `start` with z = 0.
  pub start_g: DVec3,
  /// `end` with z = 0.
  pub end_g: DVec3,
  /// Unit ground direction from start to end.
  pub side: DVec3,
  /// Unit horizontal normal of the segment (`side x +Z`).
  pub forward: DVec3,
  pub cut_plane: Plane,
  pub half_plane: Plane,
  /// Ground-projected length.
  pub length: f64,
  /// Accepted points, projected. Empty until the filter runs.
  pub points: TypedPointBuffer,
}

impl Segment {
  /// Derive the corridor geometry for a marker pair.
  pub fn between(start: DVec3, end: DVec3) -> Self {
    let start_g = DVec3::new(start.x, start.y, 0.0);
    let end_g = DVec3::new(end.x, end.y, 0.0);
    // Coincident ground positions leave no direction; fall back to +X so
    // the segment stays well-formed (its length is 0, so it accepts
    // nothing anyway).
    let side = (end_g - start_g).try_normalize().unwrap_or(DVec3::X);
    let forward = side.cross(DVec3::Z).normalize();
    let midpoint = (start_g + end_g) * 0.5;

    Self {
      start,
      end,
      start_g,
      end_g,
      side,
      forward,
      cut_plane: Plane::from_normal_and_point(forward, start_g),
      half_plane: Plane::from_normal_and_point(side, midpoint),
      length: start_g.distance(end_g),
      points: TypedPointBuffer::new(),
    }
  }

  /// Mileage of a world-space point relative to this segment's start.
  #[inline]
  pub fn local_mileage(&self, pos: DVec3) -> f64 {
    self.side.dot(pos - self.start)
  }

  /// Closest point on the ground-projected segment to a world-space point.
  pub fn closest_ground_point(&self, pos: DVec3) -> DVec3 {
    let ground = DVec3::new(pos.x, pos.y, 0.0);
    let t = self.side.dot(ground - self.start_g).clamp(0.0, self.length);
    self.start_g + self.side * t
  }

  /// Whether a world-space bounding sphere can contain corridor points.
  ///
  /// The corridor is unbounded in z, so the test runs in the ground plane:
  /// the sphere center must come strictly closer to the segment than
  /// `radius + width`. Tangency rejects.
  pub fn corridor_intersects_sphere(&self, sphere: &Sphere, width: f64) -> bool {
    let closest = self.closest_ground_point(sphere.center);
    let ground_center = DVec3::new(sphere.center.x, sphere.center.y, 0.0);
    closest.distance(ground_center) < sphere.radius + width
  }
}

#[cfg(test)]
#[path = "segment_test.rs"]
mod segment_test;
