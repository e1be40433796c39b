use glam::{DAffine3, DVec3};

use super::*;
use crate::profile::Segment;

fn flat(points: &[[f32; 3]]) -> Vec<f32> {
  points.iter().flatten().copied().collect()
}

fn run_to_completion(
  positions: &[f32],
  segment: &Segment,
  width: f64,
  base_mileage: f64,
) -> (AcceptedBatch, usize) {
  let mut cursor = FilterCursor::new();
  let mut budget = YieldBudget::new(4.0);
  let mut yields = 0;
  loop {
    match filter_segment(
      &mut cursor,
      positions,
      DVec3::ZERO,
      &DAffine3::IDENTITY,
      segment,
      width,
      base_mileage,
      &mut budget,
    ) {
      FilterStep::NotDone => yields += 1,
      FilterStep::Done(batch) => return (batch, yields),
    }
  }
}

#[test]
fn accepts_points_inside_corridor() {
  let segment = Segment::between(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0));
  let positions = flat(&[[1.0, 0.0, 0.0], [5.0, 0.0, 0.0], [9.0, 0.0, 0.0]]);

  let (batch, _) = run_to_completion(&positions, &segment, 2.0, 0.0);

  assert_eq!(batch.indices, vec![0, 1, 2]);
  assert_eq!(batch.mileage, vec![1.0, 5.0, 9.0]);
  assert_eq!(
    batch.positions,
    vec![1.0, 0.0, 0.0, 5.0, 0.0, 0.0, 9.0, 0.0, 0.0]
  );
}

#[test]
fn rejects_point_beyond_segment_end() {
  let segment = Segment::between(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0));
  let positions = flat(&[[11.0, 0.0, 0.0]]);

  let (batch, _) = run_to_completion(&positions, &segment, 2.0, 0.0);
  assert!(batch.indices.is_empty());
}

#[test]
fn rejects_point_outside_cut_plane() {
  let segment = Segment::between(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0));
  // d_cut = 2 >= width / 2 = 1
  let positions = flat(&[[5.0, 2.0, 0.0]]);

  let (batch, _) = run_to_completion(&positions, &segment, 2.0, 0.0);
  assert!(batch.indices.is_empty());
}

#[test]
fn boundary_distances_reject() {
  let segment = Segment::between(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0));
  // Exactly on the cut plane boundary: d_cut == width / 2.
  let on_cut = flat(&[[5.0, 1.0, 0.0]]);
  let (batch, _) = run_to_completion(&on_cut, &segment, 2.0, 0.0);
  assert!(batch.indices.is_empty());

  // Exactly on the segment end: d_half == length / 2.
  let on_end = flat(&[[10.0, 0.0, 0.0]]);
  let (batch, _) = run_to_completion(&on_end, &segment, 2.0, 0.0);
  assert!(batch.indices.is_empty());
}

#[test]
fn base_mileage_accumulates_across_segments() {
  // Second segment of [(0,0,0), (10,0,0), (10,10,0)].
  let segment = Segment::between(DVec3::new(10.0, 0.0, 0.0), DVec3::new(10.0, 10.0, 0.0));
  let positions = flat(&[[10.0, 5.0, 0.0]]);

  let (batch, _) = run_to_completion(&positions, &segment, 2.0, 10.0);
  assert_eq!(batch.mileage, vec![15.0]);
}

#[test]
fn projection_keeps_elevation() {
  let segment = Segment::between(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0));
  let positions = flat(&[[4.0, 0.5, 7.25]]);

  let (batch, _) = run_to_completion(&positions, &segment, 2.0, 0.0);
  assert_eq!(batch.positions, vec![4.0, 0.0, 7.25]);
  assert_eq!(batch.bounds.min, DVec3::new(4.0, 0.0, 7.25));
}

#[test]
fn world_matrix_is_applied_before_the_tests() {
  let segment = Segment::between(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0));
  // Node-local point at the origin, world transform moves it inside.
  let positions = flat(&[[0.0, 0.0, 0.0]]);
  let world = DAffine3::from_translation(DVec3::new(5.0, 0.0, 1.0));

  let mut cursor = FilterCursor::new();
  let mut budget = YieldBudget::new(4.0);
  let step = filter_segment(
    &mut cursor,
    &positions,
    DVec3::ZERO,
    &world,
    &segment,
    2.0,
    0.0,
    &mut budget,
  );
  let FilterStep::Done(batch) = step else {
    panic!("single point must finish in one slice");
  };
  assert_eq!(batch.mileage, vec![5.0]);
  assert_eq!(batch.positions, vec![5.0, 0.0, 1.0]);
}

#[test]
fn node_min_offset_is_applied() {
  let segment = Segment::between(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0));
  let positions = flat(&[[0.5, 0.0, 0.0]]);

  let mut cursor = FilterCursor::new();
  let mut budget = YieldBudget::new(4.0);
  let step = filter_segment(
    &mut cursor,
    &positions,
    DVec3::new(3.0, 0.0, 0.0),
    &DAffine3::IDENTITY,
    &segment,
    2.0,
    0.0,
    &mut budget,
  );
  let FilterStep::Done(batch) = step else {
    panic!("single point must finish in one slice");
  };
  assert_eq!(batch.mileage, vec![3.5]);
}

/// A zero budget forces a yield at every probe; the resumed passes must
/// accept exactly what a single uninterrupted pass accepts.
#[test]
fn cooperative_yield_preserves_results() {
  let segment = Segment::between(DVec3::ZERO, DVec3::new(100.0, 0.0, 0.0));
  let n = 10_000;
  let mut points = Vec::with_capacity(n);
  for i in 0..n {
    let x = (i as f32) * 100.0 / (n as f32);
    let y = if i % 3 == 0 { 0.2 } else { 5.0 }; // every third point inside
    points.push([x, y, 0.0]);
  }
  let positions = flat(&points);

  // Reference: generous budget, no yields expected.
  let (reference, _) = run_to_completion(&positions, &segment, 2.0, 0.0);

  // Starved budget: must yield at every probe and still match.
  let mut cursor = FilterCursor::new();
  let mut budget = YieldBudget::new(0.0);
  let mut yields = 0;
  let batch = loop {
    match filter_segment(
      &mut cursor,
      &positions,
      DVec3::ZERO,
      &DAffine3::IDENTITY,
      &segment,
      2.0,
      0.0,
      &mut budget,
    ) {
      FilterStep::NotDone => yields += 1,
      FilterStep::Done(batch) => break batch,
    }
  };

  assert!(yields >= 3, "expected repeated yields, got {yields}");
  assert_eq!(batch.indices, reference.indices);
  assert_eq!(batch.mileage, reference.mileage);
  assert_eq!(batch.positions, reference.positions);
}

#[test]
fn accepted_arrays_stay_parallel() {
  let segment = Segment::between(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0));
  let positions = flat(&[
    [1.0, 0.0, 0.0],
    [20.0, 0.0, 0.0],
    [2.0, 0.3, 1.0],
    [5.0, -0.4, 2.0],
  ]);

  let (batch, _) = run_to_completion(&positions, &segment, 2.0, 0.0);
  assert_eq!(batch.indices.len(), batch.mileage.len());
  assert_eq!(batch.positions.len(), batch.indices.len() * 3);
  assert_eq!(batch.indices, vec![0, 2, 3]);
}
