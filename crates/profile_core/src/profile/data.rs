//! Emission snapshot: the segment vector with whatever points have been
//! accepted since the last emission.

use crate::geom::Aabb3;

use super::Segment;

/// One progress emission of a profile request.
///
/// Emissions are additive: each carries only the points accepted since the
/// previous one, grouped by segment, and never repeats a point.
#[derive(Clone, Debug)]
pub struct ProfileData {
  pub segments: Vec<Segment>,
}

impl ProfileData {
  /// Snapshot with the given segment geometry and empty point buffers.
  pub fn empty_like(segments: &[Segment]) -> Self {
    Self {
      segments: segments
        .iter()
        .map(|segment| {
          let mut fresh = segment.clone();
          fresh.points = crate::buffer::TypedPointBuffer::new();
          fresh
        })
        .collect(),
    }
  }

  /// Total accepted points across all segments.
  pub fn size(&self) -> usize {
    self.segments.iter().map(|s| s.points.len()).sum()
  }

  /// Union of the per-segment projected boxes.
  pub fn bounding_box(&self) -> Aabb3 {
    let mut aabb = Aabb3::EMPTY;
    for segment in &self.segments {
      aabb.union(segment.points.bounding_box());
    }
    aabb
  }
}
