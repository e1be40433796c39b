//! One streamed point cloud: root node, world transform, loader.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use glam::DAffine3;

use crate::config::ProfileConfig;
use crate::error::ProfileError;
use crate::profile::Profile;
use crate::request::{ProfileRequest, RequestCallbacks};

use super::lru::NodeLru;
use super::node::{NodeLoader, NodeRef, OctreeNode};

/// Atomic counter for generating unique SourceIds.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque point-cloud source identifier.
///
/// Generated atomically - guaranteed unique within process lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SourceId(u64);

impl SourceId {
  pub fn new() -> Self {
    Self(SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl Default for SourceId {
  fn default() -> Self {
    Self::new()
  }
}

/// A streamed point cloud the profile extracts from.
///
/// The hierarchy below `root` is owned by the octree subsystem; this type
/// carries what the profile path needs: the transform into world space, the
/// loader that materializes payloads, and a visibility flag the controller
/// consults before spawning requests.
pub struct PointCloudSource {
  pub id: SourceId,
  pub root: NodeRef,
  world_matrix: DAffine3,
  visible: AtomicBool,
  loader: Arc<dyn NodeLoader>,
}

impl PointCloudSource {
  pub fn new(root: NodeRef, loader: Arc<dyn NodeLoader>) -> Self {
    Self {
      id: SourceId::new(),
      root,
      world_matrix: DAffine3::IDENTITY,
      visible: AtomicBool::new(true),
      loader,
    }
  }

  /// Builder-style world transform.
  pub fn with_world_matrix(mut self, world_matrix: DAffine3) -> Self {
    self.world_matrix = world_matrix;
    self
  }

  pub fn world_matrix(&self) -> DAffine3 {
    self.world_matrix
  }

  pub fn loader(&self) -> Arc<dyn NodeLoader> {
    Arc::clone(&self.loader)
  }

  pub fn is_visible(&self) -> bool {
    self.visible.load(Ordering::Relaxed)
  }

  pub fn set_visible(&self, visible: bool) {
    self.visible.store(visible, Ordering::Relaxed);
  }

  /// Whether a node's world-space bounding sphere can reach the corridor of
  /// any profile segment.
  pub fn node_intersects_profile(&self, node: &OctreeNode, profile: &Profile) -> bool {
    let sphere = node.bounding_sphere.transformed(&self.world_matrix);
    let width = profile.width();
    profile
      .derive_segments()
      .iter()
      .any(|segment| segment.corridor_intersects_sphere(&sphere, width))
  }

  /// Start extracting every point of this cloud inside the profile
  /// corridor. Fails with `InvalidProfile` on fewer than two markers.
  pub fn get_points_inside_profile(
    self: &Arc<Self>,
    profile: &Profile,
    config: ProfileConfig,
    lru: Option<Arc<NodeLru>>,
    callbacks: RequestCallbacks,
  ) -> Result<ProfileRequest, ProfileError> {
    ProfileRequest::new(Arc::clone(self), profile, config, lru, callbacks)
  }
}
