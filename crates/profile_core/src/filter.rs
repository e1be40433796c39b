//! Cooperative per-segment point acceptance and projection.
//!
//! The filter walks a node's position column in input order, keeps every
//! point inside the segment's corridor, and projects survivors into
//! cross-section coordinates: x = cumulative mileage, y = 0, z = elevation.
//! Mileage accumulates over many segments, so it stays f64 end to end;
//! stored geometry is f32.
//!
//! Timing is probed every [`PROBE_INTERVAL`] points. Once a probe sees more
//! than the budget elapsed, the filter parks its cursor and yields so the
//! host frame can continue; the next call resumes where it left off.

use std::time::Duration;

use glam::{DAffine3, DVec3};
use web_time::Instant;

use crate::geom::Aabb3;
use crate::profile::Segment;

/// Points examined between budget probes.
pub const PROBE_INTERVAL: usize = 1000;

/// Elapsed-time budget shared by all suspension points of one tick.
pub struct YieldBudget {
  budget: Duration,
  checkpoint: Instant,
}

impl YieldBudget {
  pub fn new(budget_ms: f64) -> Self {
    Self {
      budget: Duration::from_secs_f64(budget_ms.max(0.0) / 1000.0),
      checkpoint: Instant::now(),
    }
  }

  /// True once more than the budget elapsed since the last reset.
  #[inline]
  pub fn exhausted(&self) -> bool {
    self.checkpoint.elapsed() > self.budget
  }

  /// Start a fresh slice, typically right after yielding.
  pub fn reset(&mut self) {
    self.checkpoint = Instant::now();
  }
}

/// Survivors of one node x segment pass, in input order.
#[derive(Debug, Default)]
pub struct AcceptedBatch {
  /// Indices into the node's point list.
  pub indices: Vec<u32>,
  /// Cumulative mileage per accepted point.
  pub mileage: Vec<f64>,
  /// Projected positions, 3 floats per accepted point.
  pub positions: Vec<f32>,
  /// Bounds of the projected positions.
  pub bounds: Aabb3,
}

/// Resumable position within one node x segment pass.
#[derive(Default)]
pub struct FilterCursor {
  next_point: usize,
  batch: AcceptedBatch,
}

impl FilterCursor {
  pub fn new() -> Self {
    Self::default()
  }
}

/// Outcome of one filter slice.
pub enum FilterStep {
  /// Budget ran out; call again with the same cursor to resume.
  NotDone,
  /// The pass completed; the batch holds every survivor.
  Done(AcceptedBatch),
}

/// Run the acceptance loop until the segment is exhausted or the budget
/// trips.
///
/// `positions` is the node-local position column (3 floats per point),
/// offset by `node_min`; `world` lifts node-local into world space.
/// `base_mileage` is the polyline arc length at the segment's start.
pub fn filter_segment(
  cursor: &mut FilterCursor,
  positions: &[f32],
  node_min: DVec3,
  world: &DAffine3,
  segment: &Segment,
  width: f64,
  base_mileage: f64,
  budget: &mut YieldBudget,
) -> FilterStep {
  let num_points = positions.len() / 3;
  let half_width = width * 0.5;
  let half_length = segment.length * 0.5;
  let mut since_probe = 0usize;

  let mut i = cursor.next_point;
  while i < num_points {
    if since_probe == PROBE_INTERVAL {
      since_probe = 0;
      if budget.exhausted() {
        budget.reset();
        cursor.next_point = i;
        return FilterStep::NotDone;
      }
    }

    let local = DVec3::new(
      positions[3 * i] as f64,
      positions[3 * i + 1] as f64,
      positions[3 * i + 2] as f64,
    ) + node_min;
    let pos = world.transform_point3(local);

    let d_cut = segment.cut_plane.signed_distance(pos).abs();
    let d_half = segment.half_plane.signed_distance(pos).abs();
    // Strict comparisons: points exactly on the corridor boundary reject.
    if d_cut < half_width && d_half < half_length {
      let mileage = base_mileage + segment.local_mileage(pos);
      let projected = DVec3::new(mileage, 0.0, pos.z);
      cursor.batch.indices.push(i as u32);
      cursor.batch.mileage.push(mileage);
      cursor
        .batch
        .positions
        .extend_from_slice(&[projected.x as f32, 0.0, projected.z as f32]);
      cursor.batch.bounds.grow(projected);
    }

    since_probe += 1;
    i += 1;
  }

  cursor.next_point = num_points;
  FilterStep::Done(std::mem::take(&mut cursor.batch))
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod filter_test;
