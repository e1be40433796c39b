//! Shared fixtures for unit and end-to-end tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Mutex;

use glam::DVec3;

use crate::attributes::{AttributeData, PointAttribute};
use crate::buffer::TypedPointBuffer;
use crate::error::ProfileError;
use crate::geom::Aabb3;
use crate::octree::{NodeLoader, NodeRef, OctreeNode};
use crate::profile::Profile;
use crate::request::{ProfileRequest, RequestCallbacks, RequestId, UpdateStatus};

/// Loader serving pre-registered payloads by node name. Nodes without a
/// fixture fail to load.
#[derive(Default)]
pub struct FixtureLoader {
  payloads: Mutex<HashMap<String, TypedPointBuffer>>,
}

impl FixtureLoader {
  pub fn insert(&self, name: &str, points: TypedPointBuffer) {
    self.payloads.lock().unwrap().insert(name.to_owned(), points);
  }
}

impl NodeLoader for FixtureLoader {
  fn load(&self, node: &OctreeNode) -> Result<TypedPointBuffer, ProfileError> {
    self
      .payloads
      .lock()
      .unwrap()
      .get(&node.name)
      .cloned()
      .ok_or_else(|| ProfileError::Load(format!("no fixture for {}", node.name)))
  }
}

/// Build a payload whose node-local positions reproduce the given
/// world-space points for a node anchored at `node_min`.
pub fn payload_at(world_points: &[[f64; 3]], node_min: DVec3) -> TypedPointBuffer {
  let mut positions = Vec::with_capacity(world_points.len() * 3);
  let mut buffer = TypedPointBuffer::new();
  for p in world_points {
    let world = DVec3::new(p[0], p[1], p[2]);
    let local = world - node_min;
    positions.extend_from_slice(&[local.x as f32, local.y as f32, local.z as f32]);
    buffer.grow_bounds(world);
  }
  buffer.insert_column(PointAttribute::Position, AttributeData::F32(positions));
  buffer
}

/// Node with a pre-installed payload holding the given world-space points.
pub fn node_with_points(
  name: &str,
  level: u32,
  bounding_box: Aabb3,
  world_points: &[[f64; 3]],
  hierarchy_step_size: u32,
) -> NodeRef {
  let node = OctreeNode::new(
    name,
    level,
    world_points.len() as u32,
    bounding_box,
    hierarchy_step_size,
  );
  node.set_points(payload_at(world_points, bounding_box.min));
  node
}

/// Payload with an intensity column alongside positions, for attribute
/// copy-through tests.
pub fn payload_with_intensity(
  world_points: &[[f64; 3]],
  intensities: &[u16],
  node_min: DVec3,
) -> TypedPointBuffer {
  let mut buffer = payload_at(world_points, node_min);
  buffer.insert_column(PointAttribute::Intensity, AttributeData::U16(intensities.to_vec()));
  buffer
}

/// Straight profile along the given markers.
pub fn profile_line(markers: &[[f64; 3]], width: f64) -> Profile {
  let mut profile = Profile::new(width);
  for m in markers {
    profile.add_marker(DVec3::new(m[0], m[1], m[2]));
  }
  profile
}

/// Tick a request until it reaches a terminal state, sleeping briefly on
/// `Working` so in-flight loads can land.
pub fn drive(request: &mut ProfileRequest, max_ticks: usize) -> UpdateStatus {
  let mut status = UpdateStatus::Working;
  for _ in 0..max_ticks {
    status = request.update();
    if status != UpdateStatus::Working {
      break;
    }
    std::thread::sleep(std::time::Duration::from_micros(200));
  }
  status
}

/// Everything the callbacks observed, for assertions after the fact.
#[derive(Default)]
pub struct Recorded {
  pub progress: Rc<RefCell<Vec<crate::profile::ProfileData>>>,
  pub finished: Rc<RefCell<Vec<RequestId>>>,
  pub cancelled: Rc<RefCell<Vec<(RequestId, Option<ProfileError>)>>>,
}

/// Callbacks that record every invocation.
pub fn recording_callbacks() -> (RequestCallbacks, Recorded) {
  let recorded = Recorded::default();
  let progress = Rc::clone(&recorded.progress);
  let finished = Rc::clone(&recorded.finished);
  let cancelled = Rc::clone(&recorded.cancelled);
  let callbacks = RequestCallbacks {
    on_progress: Box::new(move |id, data| {
      let _ = id;
      progress.borrow_mut().push(data);
    }),
    on_finish: Box::new(move |id| finished.borrow_mut().push(id)),
    on_cancel: Box::new(move |id, reason| cancelled.borrow_mut().push((id, reason))),
  };
  (callbacks, recorded)
}

impl Recorded {
  /// Total points across all progress emissions.
  pub fn total_points(&self) -> usize {
    self.progress.borrow().iter().map(|data| data.size()).sum()
  }
}
