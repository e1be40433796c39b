//! Point attribute vocabulary and typed column storage.
//!
//! The attribute set is closed: every attribute has a fixed element type and
//! a fixed elements-per-point stride. Columns are stored per-attribute
//! (structure-of-arrays), which is what both the filter hot loop and GPU
//! upload paths want.

/// Closed set of per-point attributes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PointAttribute {
  /// Cartesian position, 3 x f32. Node payloads store it node-local;
  /// projected buffers store cross-section coordinates.
  Position,
  /// RGBA color, 4 x u8.
  Color,
  /// Return intensity, u16.
  Intensity,
  /// ASPRS classification code, u8.
  Classification,
  /// Return number within a pulse, u8.
  ReturnNumber,
  /// Number of returns for a pulse, u8.
  NumberOfReturns,
  /// Acquisition source id, u16.
  PointSourceId,
  /// Arc-length along the profile polyline, f64. Produced only by the
  /// segment filter, never read from node geometry.
  Mileage,
  /// Auxiliary per-point index byte. Accepted in buffers, never produced
  /// by this core.
  Indices,
}

/// Scalar element type of a column.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ElementType {
  U8,
  U16,
  U32,
  F32,
  F64,
}

impl PointAttribute {
  /// Every attribute, in declaration order.
  pub const ALL: [PointAttribute; 9] = [
    PointAttribute::Position,
    PointAttribute::Color,
    PointAttribute::Intensity,
    PointAttribute::Classification,
    PointAttribute::ReturnNumber,
    PointAttribute::NumberOfReturns,
    PointAttribute::PointSourceId,
    PointAttribute::Mileage,
    PointAttribute::Indices,
  ];

  /// Default elements-per-point for this attribute.
  #[inline]
  pub fn stride(self) -> usize {
    match self {
      PointAttribute::Position => 3,
      PointAttribute::Color => 4,
      _ => 1,
    }
  }

  /// Scalar element type of this attribute's column.
  #[inline]
  pub fn element(self) -> ElementType {
    match self {
      PointAttribute::Position => ElementType::F32,
      PointAttribute::Color => ElementType::U8,
      PointAttribute::Intensity => ElementType::U16,
      PointAttribute::Classification => ElementType::U8,
      PointAttribute::ReturnNumber => ElementType::U8,
      PointAttribute::NumberOfReturns => ElementType::U8,
      PointAttribute::PointSourceId => ElementType::U16,
      PointAttribute::Mileage => ElementType::F64,
      PointAttribute::Indices => ElementType::U8,
    }
  }
}

/// Typed column storage.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeData {
  U8(Vec<u8>),
  U16(Vec<u16>),
  U32(Vec<u32>),
  F32(Vec<f32>),
  F64(Vec<f64>),
}

fn gather_slice<T: Copy>(data: &[T], indices: &[u32], stride: usize) -> Vec<T> {
  let mut out = Vec::with_capacity(indices.len() * stride);
  for &i in indices {
    let base = i as usize * stride;
    out.extend_from_slice(&data[base..base + stride]);
  }
  out
}

impl AttributeData {
  /// Empty column of the given element type.
  pub fn empty(element: ElementType) -> Self {
    match element {
      ElementType::U8 => AttributeData::U8(Vec::new()),
      ElementType::U16 => AttributeData::U16(Vec::new()),
      ElementType::U32 => AttributeData::U32(Vec::new()),
      ElementType::F32 => AttributeData::F32(Vec::new()),
      ElementType::F64 => AttributeData::F64(Vec::new()),
    }
  }

  /// Number of scalar elements (not points).
  pub fn len(&self) -> usize {
    match self {
      AttributeData::U8(v) => v.len(),
      AttributeData::U16(v) => v.len(),
      AttributeData::U32(v) => v.len(),
      AttributeData::F32(v) => v.len(),
      AttributeData::F64(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Element type of this column.
  pub fn element(&self) -> ElementType {
    match self {
      AttributeData::U8(_) => ElementType::U8,
      AttributeData::U16(_) => ElementType::U16,
      AttributeData::U32(_) => ElementType::U32,
      AttributeData::F32(_) => ElementType::F32,
      AttributeData::F64(_) => ElementType::F64,
    }
  }

  /// Append `count` zero elements at the tail.
  pub fn zero_extend(&mut self, count: usize) {
    match self {
      AttributeData::U8(v) => v.extend(std::iter::repeat(0u8).take(count)),
      AttributeData::U16(v) => v.extend(std::iter::repeat(0u16).take(count)),
      AttributeData::U32(v) => v.extend(std::iter::repeat(0u32).take(count)),
      AttributeData::F32(v) => v.extend(std::iter::repeat(0.0f32).take(count)),
      AttributeData::F64(v) => v.extend(std::iter::repeat(0.0f64).take(count)),
    }
  }

  /// Insert `count` zero elements at the front.
  pub fn zero_prefix(&mut self, count: usize) {
    match self {
      AttributeData::U8(v) => v.splice(0..0, std::iter::repeat(0u8).take(count)).for_each(drop),
      AttributeData::U16(v) => v.splice(0..0, std::iter::repeat(0u16).take(count)).for_each(drop),
      AttributeData::U32(v) => v.splice(0..0, std::iter::repeat(0u32).take(count)).for_each(drop),
      AttributeData::F32(v) => v.splice(0..0, std::iter::repeat(0.0f32).take(count)).for_each(drop),
      AttributeData::F64(v) => v.splice(0..0, std::iter::repeat(0.0f64).take(count)).for_each(drop),
    }
  }

  /// Concatenate another column of the same element type.
  /// Returns false (and leaves self untouched) on a type mismatch.
  pub fn extend_from(&mut self, other: &AttributeData) -> bool {
    match (self, other) {
      (AttributeData::U8(a), AttributeData::U8(b)) => a.extend_from_slice(b),
      (AttributeData::U16(a), AttributeData::U16(b)) => a.extend_from_slice(b),
      (AttributeData::U32(a), AttributeData::U32(b)) => a.extend_from_slice(b),
      (AttributeData::F32(a), AttributeData::F32(b)) => a.extend_from_slice(b),
      (AttributeData::F64(a), AttributeData::F64(b)) => a.extend_from_slice(b),
      _ => return false,
    }
    true
  }

  /// Select per-point element groups by point index.
  pub fn gather(&self, indices: &[u32], stride: usize) -> AttributeData {
    match self {
      AttributeData::U8(v) => AttributeData::U8(gather_slice(v, indices, stride)),
      AttributeData::U16(v) => AttributeData::U16(gather_slice(v, indices, stride)),
      AttributeData::U32(v) => AttributeData::U32(gather_slice(v, indices, stride)),
      AttributeData::F32(v) => AttributeData::F32(gather_slice(v, indices, stride)),
      AttributeData::F64(v) => AttributeData::F64(gather_slice(v, indices, stride)),
    }
  }

  /// Borrow as f32 slice, if this is an f32 column.
  pub fn as_f32(&self) -> Option<&[f32]> {
    match self {
      AttributeData::F32(v) => Some(v),
      _ => None,
    }
  }

  /// Borrow as f64 slice, if this is an f64 column.
  pub fn as_f64(&self) -> Option<&[f64]> {
    match self {
      AttributeData::F64(v) => Some(v),
      _ => None,
    }
  }

  /// Borrow as u8 slice, if this is a u8 column.
  pub fn as_u8(&self) -> Option<&[u8]> {
    match self {
      AttributeData::U8(v) => Some(v),
      _ => None,
    }
  }

  /// Borrow as u16 slice, if this is a u16 column.
  pub fn as_u16(&self) -> Option<&[u16]> {
    match self {
      AttributeData::U16(v) => Some(v),
      _ => None,
    }
  }
}
