//! Octree node with asynchronously loaded point payload.
//!
//! `load` is non-blocking and idempotent: the first call hands the work to
//! the rayon pool and parks a bounded channel; `poll_loaded` installs the
//! payload once it arrives. Identity is pointer identity, which is what the
//! traversal's duplicate-push guard and the LRU key on.

use std::sync::{Arc, Mutex, OnceLock, RwLock};

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use smallvec::SmallVec;

use crate::buffer::TypedPointBuffer;
use crate::error::ProfileError;
use crate::geom::{Aabb3, Sphere};

/// Shared handle to a node.
pub type NodeRef = Arc<OctreeNode>;

/// Pointer identity of a node, used as cache and visited-set key.
#[inline]
pub fn node_id(node: &NodeRef) -> usize {
  Arc::as_ptr(node) as usize
}

/// Produces a node's point payload. Runs on the rayon pool; implementations
/// wrap whatever storage backs the octree (local files, HTTP, test fixtures).
pub trait NodeLoader: Send + Sync + 'static {
  fn load(&self, node: &OctreeNode) -> Result<TypedPointBuffer, ProfileError>;
}

enum LoadState {
  Idle,
  Pending(Receiver<Result<TypedPointBuffer, ProfileError>>),
}

/// One spatial cell of an out-of-core octree.
///
/// The `position` column of a loaded payload is node-local: world position =
/// `world_matrix * (bounding_box.min + position[i])`.
pub struct OctreeNode {
  pub name: String,
  pub level: u32,
  pub num_points: u32,
  pub bounding_box: Aabb3,
  pub bounding_sphere: Sphere,
  /// Levels between materialized hierarchy layers; expansion only happens
  /// at multiples of this step.
  pub hierarchy_step_size: u32,
  children: RwLock<[Option<NodeRef>; 8]>,
  payload: OnceLock<Arc<TypedPointBuffer>>,
  load_state: Mutex<LoadState>,
}

impl OctreeNode {
  pub fn new(
    name: &str,
    level: u32,
    num_points: u32,
    bounding_box: Aabb3,
    hierarchy_step_size: u32,
  ) -> NodeRef {
    Arc::new(Self {
      name: name.to_owned(),
      level,
      num_points,
      bounding_sphere: Sphere::enclosing(&bounding_box),
      bounding_box,
      hierarchy_step_size,
      children: RwLock::new(std::array::from_fn(|_| None)),
      payload: OnceLock::new(),
      load_state: Mutex::new(LoadState::Idle),
    })
  }

  /// Attach a child in the given octant slot.
  pub fn set_child(&self, octant: usize, child: NodeRef) {
    self.children.write().unwrap()[octant] = Some(child);
  }

  pub fn child(&self, octant: usize) -> Option<NodeRef> {
    self.children.read().unwrap()[octant].clone()
  }

  /// Present children, densely packed.
  pub fn children(&self) -> SmallVec<[NodeRef; 8]> {
    self
      .children
      .read()
      .unwrap()
      .iter()
      .flatten()
      .cloned()
      .collect()
  }

  pub fn has_children(&self) -> bool {
    self.children.read().unwrap().iter().any(Option::is_some)
  }

  pub fn is_loaded(&self) -> bool {
    self.payload.get().is_some()
  }

  /// The loaded payload, if any.
  pub fn points(&self) -> Option<Arc<TypedPointBuffer>> {
    self.payload.get().cloned()
  }

  /// Install a payload directly, bypassing the async path. Later calls are
  /// ignored, matching the idempotence of `load`.
  pub fn set_points(&self, points: TypedPointBuffer) {
    let _ = self.payload.set(Arc::new(points));
  }

  /// Kick off an asynchronous load. No-op when the payload is present or a
  /// load is already in flight.
  pub fn load(self: &Arc<Self>, loader: &Arc<dyn NodeLoader>) {
    let mut state = self.load_state.lock().unwrap();
    if self.is_loaded() || matches!(*state, LoadState::Pending(_)) {
      return;
    }
    let (sender, receiver) = bounded(1);
    let node = Arc::clone(self);
    let loader = Arc::clone(loader);
    rayon::spawn(move || {
      // A dropped receiver means the request went away; nothing to do.
      let _ = sender.send(loader.load(&node));
    });
    *state = LoadState::Pending(receiver);
  }

  /// Install the payload if the pending load finished.
  ///
  /// Returns `Ok(true)` when the payload is available, `Ok(false)` while
  /// the load is still in flight, and the loader's error on failure (the
  /// node goes back to idle so callers decide whether to retry).
  pub fn poll_loaded(&self) -> Result<bool, ProfileError> {
    let mut state = self.load_state.lock().unwrap();
    let LoadState::Pending(receiver) = &*state else {
      return Ok(self.is_loaded());
    };
    let outcome = receiver.try_recv();
    match outcome {
      Ok(Ok(points)) => {
        let _ = self.payload.set(Arc::new(points));
        *state = LoadState::Idle;
        Ok(true)
      }
      Ok(Err(error)) => {
        *state = LoadState::Idle;
        Err(error)
      }
      Err(TryRecvError::Empty) => Ok(false),
      Err(TryRecvError::Disconnected) => {
        *state = LoadState::Idle;
        Err(ProfileError::Load("loader dropped the result channel".into()))
      }
    }
  }
}

impl std::fmt::Debug for OctreeNode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OctreeNode")
      .field("name", &self.name)
      .field("level", &self.level)
      .field("num_points", &self.num_points)
      .field("loaded", &self.is_loaded())
      .finish()
  }
}
