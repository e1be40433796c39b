//! Per-source batched output of projected points.
//!
//! Downstream GPU upload prefers many mid-sized contiguous buffers over one
//! giant growing buffer, so each entry appends into fixed-capacity columnar
//! batches. A full batch is sealed (bounding volume + update range) and a
//! fresh one is taken from the injected pool; the pool's lifecycle belongs
//! to the render session, not to this module.

use glam::DVec3;

use crate::attributes::PointAttribute;
use crate::buffer::TypedPointBuffer;
use crate::geom::{Aabb3, Sphere};
use crate::octree::SourceId;

/// Fixed-capacity columnar batch of projected points.
///
/// Column layout matches what the point material consumes: position f32x3,
/// color u8x4, and the scalar LAS-style attributes. `draw_range` covers the
/// filled prefix.
pub struct PointBatch {
  capacity: usize,
  len: usize,
  position: Vec<f32>,
  color: Vec<u8>,
  intensity: Vec<u16>,
  classification: Vec<u8>,
  return_number: Vec<u8>,
  number_of_returns: Vec<u8>,
  point_source_id: Vec<u16>,
  bounds: Aabb3,
  bounding_sphere: Option<Sphere>,
  /// (start, count) of elements touched since the batch was sealed.
  update_range: Option<(usize, usize)>,
  sealed: bool,
}

impl PointBatch {
  fn new(capacity: usize) -> Self {
    Self {
      capacity,
      len: 0,
      position: vec![0.0; capacity * 3],
      color: vec![0; capacity * 4],
      intensity: vec![0; capacity],
      classification: vec![0; capacity],
      return_number: vec![0; capacity],
      number_of_returns: vec![0; capacity],
      point_source_id: vec![0; capacity],
      bounds: Aabb3::EMPTY,
      bounding_sphere: None,
      update_range: None,
      sealed: false,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn is_full(&self) -> bool {
    self.len == self.capacity
  }

  pub fn is_sealed(&self) -> bool {
    self.sealed
  }

  pub fn draw_range(&self) -> (usize, usize) {
    (0, self.len)
  }

  pub fn update_range(&self) -> Option<(usize, usize)> {
    self.update_range
  }

  pub fn bounds(&self) -> &Aabb3 {
    &self.bounds
  }

  pub fn bounding_sphere(&self) -> Option<&Sphere> {
    self.bounding_sphere.as_ref()
  }

  pub fn positions(&self) -> &[f32] {
    &self.position[..self.len * 3]
  }

  pub fn colors(&self) -> &[u8] {
    &self.color[..self.len * 4]
  }

  pub fn intensities(&self) -> &[u16] {
    &self.intensity[..self.len]
  }

  pub fn classifications(&self) -> &[u8] {
    &self.classification[..self.len]
  }

  pub fn return_numbers(&self) -> &[u8] {
    &self.return_number[..self.len]
  }

  pub fn numbers_of_returns(&self) -> &[u8] {
    &self.number_of_returns[..self.len]
  }

  pub fn point_source_ids(&self) -> &[u16] {
    &self.point_source_id[..self.len]
  }

  #[allow(clippy::too_many_arguments)]
  fn push_point(
    &mut self,
    position: [f32; 3],
    color: [u8; 4],
    intensity: u16,
    classification: u8,
    return_number: u8,
    number_of_returns: u8,
    point_source_id: u16,
  ) {
    debug_assert!(self.len < self.capacity);
    let i = self.len;
    self.position[3 * i..3 * i + 3].copy_from_slice(&position);
    self.color[4 * i..4 * i + 4].copy_from_slice(&color);
    self.intensity[i] = intensity;
    self.classification[i] = classification;
    self.return_number[i] = return_number;
    self.number_of_returns[i] = number_of_returns;
    self.point_source_id[i] = point_source_id;
    self.bounds.grow(DVec3::new(
      position[0] as f64,
      position[1] as f64,
      position[2] as f64,
    ));
    self.len += 1;
  }

  /// Seal a full batch: compute its bounding volume and mark the attribute
  /// range the uploader must flush.
  fn seal(&mut self) {
    self.bounding_sphere = Some(Sphere::enclosing(&self.bounds));
    self.update_range = Some((0, self.len));
    self.sealed = true;
  }

  fn reset(&mut self) {
    self.len = 0;
    self.bounds = Aabb3::EMPTY;
    self.bounding_sphere = None;
    self.update_range = None;
    self.sealed = false;
  }
}

/// Recycling allocator for [`PointBatch`]es, handed to entries on append.
pub struct BatchPool {
  capacity: usize,
  free: Vec<PointBatch>,
}

impl BatchPool {
  pub fn new(capacity: usize) -> Self {
    assert!(capacity > 0, "batch capacity must be positive");
    Self {
      capacity,
      free: Vec::new(),
    }
  }

  pub fn batch_capacity(&self) -> usize {
    self.capacity
  }

  pub fn available(&self) -> usize {
    self.free.len()
  }

  pub fn acquire(&mut self) -> PointBatch {
    match self.free.pop() {
      Some(mut batch) => {
        batch.reset();
        batch
      }
      None => PointBatch::new(self.capacity),
    }
  }

  pub fn release(&mut self, batch: PointBatch) {
    if batch.capacity == self.capacity {
      self.free.push(batch);
    }
  }
}

/// Batched projected output for one point-cloud source.
pub struct ProjectedEntry {
  source: SourceId,
  sealed: Vec<PointBatch>,
  active: PointBatch,
  projected_box: Aabb3,
  total_points: usize,
}

impl ProjectedEntry {
  pub fn new(source: SourceId, pool: &mut BatchPool) -> Self {
    Self {
      source,
      sealed: Vec::new(),
      active: pool.acquire(),
      projected_box: Aabb3::EMPTY,
      total_points: 0,
    }
  }

  pub fn source(&self) -> SourceId {
    self.source
  }

  pub fn total_points(&self) -> usize {
    self.total_points
  }

  /// Union of every appended buffer's projected box.
  pub fn projected_box(&self) -> Aabb3 {
    self.projected_box
  }

  /// Sealed batches followed by the partially filled active one.
  pub fn batches(&self) -> impl Iterator<Item = &PointBatch> {
    self
      .sealed
      .iter()
      .chain(std::iter::once(&self.active).filter(|batch| !batch.is_empty()))
  }

  pub fn batch_count(&self) -> usize {
    self.sealed.len() + usize::from(!self.active.is_empty())
  }

  /// Append a projected buffer, sealing and replacing the active batch as
  /// it fills. Missing attribute columns write zeros.
  pub fn append(&mut self, points: &TypedPointBuffer, pool: &mut BatchPool) -> usize {
    let count = points.len();
    if count == 0 {
      return 0;
    }

    let position = points
      .column(PointAttribute::Position)
      .and_then(|c| c.data.as_f32());
    let color = points
      .column(PointAttribute::Color)
      .map(|c| (c.stride, c.data.as_u8()));
    let intensity = points
      .column(PointAttribute::Intensity)
      .and_then(|c| c.data.as_u16());
    let classification = points
      .column(PointAttribute::Classification)
      .and_then(|c| c.data.as_u8());
    let return_number = points
      .column(PointAttribute::ReturnNumber)
      .and_then(|c| c.data.as_u8());
    let number_of_returns = points
      .column(PointAttribute::NumberOfReturns)
      .and_then(|c| c.data.as_u8());
    let point_source_id = points
      .column(PointAttribute::PointSourceId)
      .and_then(|c| c.data.as_u16());

    for i in 0..count {
      if self.active.is_full() {
        self.active.seal();
        let full = std::mem::replace(&mut self.active, pool.acquire());
        self.sealed.push(full);
      }

      let pos = match position {
        Some(p) => [p[3 * i], p[3 * i + 1], p[3 * i + 2]],
        None => [0.0; 3],
      };
      let rgba = match &color {
        Some((4, Some(c))) => [c[4 * i], c[4 * i + 1], c[4 * i + 2], c[4 * i + 3]],
        Some((3, Some(c))) => [c[3 * i], c[3 * i + 1], c[3 * i + 2], 255],
        _ => [0; 4],
      };
      self.active.push_point(
        pos,
        rgba,
        intensity.map_or(0, |v| v[i]),
        classification.map_or(0, |v| v[i]),
        return_number.map_or(0, |v| v[i]),
        number_of_returns.map_or(0, |v| v[i]),
        point_source_id.map_or(0, |v| v[i]),
      );
    }

    self.projected_box.union(points.bounding_box());
    self.total_points += count;
    count
  }

  /// Return every batch to the pool, consuming the entry.
  pub fn recycle(mut self, pool: &mut BatchPool) {
    for batch in self.sealed.drain(..) {
      pool.release(batch);
    }
    pool.release(self.active);
  }
}

#[cfg(test)]
mod tests {
  use glam::DVec3;

  use super::*;
  use crate::attributes::AttributeData;

  fn projected_buffer(n: usize, x0: f64) -> TypedPointBuffer {
    let mut buffer = TypedPointBuffer::new();
    let mut positions = Vec::with_capacity(n * 3);
    for i in 0..n {
      let x = x0 + i as f64;
      positions.extend_from_slice(&[x as f32, 0.0, 1.0]);
      buffer.grow_bounds(DVec3::new(x, 0.0, 1.0));
    }
    buffer.insert_column(PointAttribute::Position, AttributeData::F32(positions));
    buffer
  }

  #[test]
  fn append_fills_the_active_batch() {
    let mut pool = BatchPool::new(10);
    let mut entry = ProjectedEntry::new(SourceId::new(), &mut pool);

    let appended = entry.append(&projected_buffer(4, 0.0), &mut pool);
    assert_eq!(appended, 4);
    assert_eq!(entry.total_points(), 4);
    assert_eq!(entry.batch_count(), 1);

    let batch = entry.batches().next().unwrap();
    assert_eq!(batch.draw_range(), (0, 4));
    assert!(!batch.is_sealed());
  }

  #[test]
  fn full_batches_are_sealed_and_replaced() {
    let mut pool = BatchPool::new(3);
    let mut entry = ProjectedEntry::new(SourceId::new(), &mut pool);

    entry.append(&projected_buffer(8, 0.0), &mut pool);

    // 8 points across capacity-3 batches: 3 + 3 sealed, 2 active.
    assert_eq!(entry.batch_count(), 3);
    let batches: Vec<&PointBatch> = entry.batches().collect();
    assert!(batches[0].is_sealed());
    assert!(batches[1].is_sealed());
    assert!(!batches[2].is_sealed());
    assert_eq!(batches[0].update_range(), Some((0, 3)));
    assert!(batches[0].bounding_sphere().is_some());
    assert_eq!(batches[2].len(), 2);
  }

  #[test]
  fn missing_columns_write_zeros() {
    let mut pool = BatchPool::new(10);
    let mut entry = ProjectedEntry::new(SourceId::new(), &mut pool);
    entry.append(&projected_buffer(2, 5.0), &mut pool);

    let batch = entry.batches().next().unwrap();
    assert_eq!(batch.colors(), &[0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(batch.intensities(), &[0, 0]);
  }

  #[test]
  fn rgb_color_expands_with_opaque_alpha() {
    let mut buffer = projected_buffer(1, 0.0);
    buffer.insert_column_with_stride(
      PointAttribute::Color,
      AttributeData::U8(vec![10, 20, 30]),
      3,
    );

    let mut pool = BatchPool::new(10);
    let mut entry = ProjectedEntry::new(SourceId::new(), &mut pool);
    entry.append(&buffer, &mut pool);

    let batch = entry.batches().next().unwrap();
    assert_eq!(batch.colors(), &[10, 20, 30, 255]);
  }

  #[test]
  fn projected_box_tracks_appends() {
    let mut pool = BatchPool::new(10);
    let mut entry = ProjectedEntry::new(SourceId::new(), &mut pool);

    entry.append(&projected_buffer(2, 0.0), &mut pool);
    entry.append(&projected_buffer(2, 100.0), &mut pool);

    let aabb = entry.projected_box();
    assert_eq!(aabb.min.x, 0.0);
    assert_eq!(aabb.max.x, 101.0);
  }

  #[test]
  fn recycle_returns_batches_to_the_pool() {
    let mut pool = BatchPool::new(3);
    let mut entry = ProjectedEntry::new(SourceId::new(), &mut pool);
    entry.append(&projected_buffer(7, 0.0), &mut pool);
    assert_eq!(pool.available(), 0);

    entry.recycle(&mut pool);
    assert_eq!(pool.available(), 3); // two sealed + one active

    // Acquired batches come back clean.
    let batch = pool.acquire();
    assert!(batch.is_empty());
    assert!(!batch.is_sealed());
    assert!(batch.bounds().is_empty());
  }
}
