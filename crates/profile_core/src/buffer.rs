//! Growable columnar point store with append-merge of heterogeneous
//! column sets.
//!
//! Columns are per-attribute typed arrays. `num_points` is the single source
//! of truth: after any `append`, every non-empty column holds exactly
//! `num_points * stride` elements. Attributes missing on one side of an
//! append are zero-filled so downstream consumers never see ragged columns.

use std::collections::HashMap;

use glam::DVec3;

use crate::attributes::{AttributeData, PointAttribute};
use crate::error::ProfileError;
use crate::geom::Aabb3;

/// One stored column: its data plus the elements-per-point it was built
/// with. The stride normally comes from the attribute kind, but loaders may
/// produce nonstandard layouts (RGB color without alpha, for example).
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
  pub stride: usize,
  pub data: AttributeData,
}

/// Columnar store of per-point attributes with a monotone bounding box.
#[derive(Clone, Debug, Default)]
pub struct TypedPointBuffer {
  num_points: usize,
  columns: HashMap<PointAttribute, Column>,
  bounds: Aabb3,
}

impl TypedPointBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of points across all columns.
  pub fn len(&self) -> usize {
    self.num_points
  }

  pub fn is_empty(&self) -> bool {
    self.num_points == 0
  }

  /// Borrow a column by attribute kind.
  pub fn column(&self, kind: PointAttribute) -> Option<&Column> {
    self.columns.get(&kind)
  }

  /// Iterate over all stored columns.
  pub fn columns(&self) -> impl Iterator<Item = (PointAttribute, &Column)> {
    self.columns.iter().map(|(kind, column)| (*kind, column))
  }

  /// Bounding box of the stored points. Unions monotonically; `append` and
  /// `grow_bounds` only ever widen it.
  pub fn bounding_box(&self) -> &Aabb3 {
    &self.bounds
  }

  /// Expand the bounding box to contain a point.
  pub fn grow_bounds(&mut self, point: DVec3) {
    self.bounds.grow(point);
  }

  /// Union another box into the bounding box.
  pub fn union_bounds(&mut self, other: &Aabb3) {
    self.bounds.union(other);
  }

  /// Install a column with the attribute's default stride.
  ///
  /// # Panics
  /// Asserts that the column length is `num_points * stride`. The first
  /// installed column fixes `num_points`.
  pub fn insert_column(&mut self, kind: PointAttribute, data: AttributeData) {
    self.insert_column_with_stride(kind, data, kind.stride());
  }

  /// Install a column with an explicit stride.
  pub fn insert_column_with_stride(
    &mut self,
    kind: PointAttribute,
    data: AttributeData,
    stride: usize,
  ) {
    assert!(stride > 0, "column stride must be positive");
    assert_eq!(
      data.len() % stride,
      0,
      "column length must be a multiple of its stride"
    );
    let points = data.len() / stride;
    if self.columns.is_empty() && self.num_points == 0 {
      self.num_points = points;
    } else {
      assert_eq!(
        points, self.num_points,
        "column point count must match the buffer"
      );
    }
    self.columns.insert(kind, Column { stride, data });
  }

  /// Append another buffer.
  ///
  /// Attributes present in both are concatenated; attributes present only
  /// on one side are zero-filled on the other so every column stays at
  /// `num_points * stride` elements. Bounding boxes are unioned.
  pub fn append(&mut self, other: &TypedPointBuffer) -> Result<(), ProfileError> {
    // Validate strides up front so a mismatch leaves self untouched.
    for (kind, theirs) in &other.columns {
      if let Some(ours) = self.columns.get(kind) {
        if ours.stride != theirs.stride {
          return Err(ProfileError::StrideMismatch {
            attribute: *kind,
            expected: ours.stride,
            actual: theirs.stride,
          });
        }
      }
    }

    for (kind, ours) in self.columns.iter_mut() {
      match other.columns.get(kind) {
        Some(theirs) => {
          if !ours.data.extend_from(&theirs.data) {
            // Strides agree but element types differ; treat as the same
            // defect since the columns cannot be merged.
            return Err(ProfileError::StrideMismatch {
              attribute: *kind,
              expected: ours.stride,
              actual: theirs.stride,
            });
          }
        }
        None => ours.data.zero_extend(other.num_points * ours.stride),
      }
    }

    for (kind, theirs) in &other.columns {
      if !self.columns.contains_key(kind) {
        let mut data = AttributeData::empty(theirs.data.element());
        data.zero_extend(self.num_points * theirs.stride);
        let appended = data.extend_from(&theirs.data);
        debug_assert!(appended);
        self.columns.insert(
          *kind,
          Column {
            stride: theirs.stride,
            data,
          },
        );
      }
    }

    self.num_points += other.num_points;
    self.bounds.union(&other.bounds);

    debug_assert!(self
      .columns
      .values()
      .all(|c| c.data.is_empty() || c.data.len() == self.num_points * c.stride));

    Ok(())
  }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod buffer_test;
