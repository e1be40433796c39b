//! Tick-driven extraction state machine for one (source, profile) pair.
//!
//! The host calls `update` once per frame. Each tick promotes at most
//! `max_nodes_per_update` loaded nodes to filtering, but the filtering
//! itself may span many ticks through the cooperative yield. Not-yet-loaded
//! nodes kick off an asynchronous load and end the tick; re-pushing them
//! with their original weight keeps the coarse-to-fine order intact.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::attributes::{AttributeData, PointAttribute};
use crate::buffer::TypedPointBuffer;
use crate::config::ProfileConfig;
use crate::error::ProfileError;
use crate::filter::{filter_segment, FilterCursor, FilterStep, YieldBudget};
use crate::octree::{node_id, NodeLru, NodeRef, PointCloudSource};
use crate::profile::{Profile, ProfileData, Segment};
use crate::queue::TraversalQueue;

/// Accumulated points below this count are held back from emission until
/// the request drains.
const EMIT_MIN_POINTS: usize = 100;

/// Atomic counter for generating unique RequestIds.
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque request identifier, unique within process lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RequestId(u64);

impl RequestId {
  pub fn new() -> Self {
    Self(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl Default for RequestId {
  fn default() -> Self {
    Self::new()
  }
}

/// Result of one `update` tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UpdateStatus {
  /// More work remains; call `update` again next frame.
  Working,
  /// The queue drained and `on_finish` fired.
  Finished,
  /// The request was cancelled and `on_cancel` fired.
  Cancelled,
}

/// Progress and lifecycle callbacks for one request.
///
/// At most one of `on_finish` / `on_cancel` fires per request.
pub struct RequestCallbacks {
  pub on_progress: Box<dyn FnMut(RequestId, ProfileData)>,
  pub on_finish: Box<dyn FnMut(RequestId)>,
  pub on_cancel: Box<dyn FnMut(RequestId, Option<ProfileError>)>,
}

impl RequestCallbacks {
  /// Callbacks that drop everything; useful for tests and fire-and-forget
  /// extraction.
  pub fn noop() -> Self {
    Self {
      on_progress: Box::new(|_, _| {}),
      on_finish: Box::new(|_| {}),
      on_cancel: Box::new(|_, _| {}),
    }
  }
}

/// Counters exposed for host HUDs and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestStats {
  /// Nodes promoted out of the queue (served or skipped).
  pub nodes_served: usize,
  /// Nodes dropped for missing or unloadable geometry.
  pub nodes_skipped: usize,
  /// Ticks that ended waiting on an asynchronous load.
  pub loads_awaited: usize,
  /// Points accepted by the filter.
  pub points_accepted: usize,
  /// Cooperative yields taken by the filter.
  pub filter_yields: usize,
}

enum Phase {
  Traversing,
  Filtering {
    node: NodeRef,
    segment_index: usize,
    cursor: FilterCursor,
  },
  Done(UpdateStatus),
}

enum TraverseOutcome {
  /// A loaded node moved into the filtering phase.
  Promoted,
  /// A load is in flight; the tick ends.
  AwaitingLoad,
  /// The queue drained; terminal status inside.
  Drained(UpdateStatus),
}

enum FilterOutcome {
  /// Budget ran out mid-node.
  Yielded,
  /// The promoted node is fully consumed.
  Consumed,
  /// A fatal buffer defect cancelled the request.
  Failed(UpdateStatus),
}

/// One in-flight profile extraction over one point-cloud source.
pub struct ProfileRequest {
  id: RequestId,
  source: Arc<PointCloudSource>,
  width: f64,
  segments: Vec<Segment>,
  /// Polyline arc length at each segment's start.
  base_mileage: Vec<f64>,
  config: ProfileConfig,
  max_depth: u32,
  points_served: usize,
  highest_level_served: u32,
  cancel_requested: bool,
  queue: TraversalQueue,
  served: HashSet<usize>,
  temporary: ProfileData,
  phase: Phase,
  budget: YieldBudget,
  lru: Option<Arc<NodeLru>>,
  callbacks: RequestCallbacks,
  stats: RequestStats,
}

impl ProfileRequest {
  pub(crate) fn new(
    source: Arc<PointCloudSource>,
    profile: &Profile,
    config: ProfileConfig,
    lru: Option<Arc<NodeLru>>,
    callbacks: RequestCallbacks,
  ) -> Result<Self, ProfileError> {
    if !profile.is_valid() {
      return Err(ProfileError::InvalidProfile);
    }

    let segments = profile.derive_segments();
    let mut base_mileage = Vec::with_capacity(segments.len());
    let mut mileage = 0.0;
    for segment in &segments {
      base_mileage.push(mileage);
      mileage += segment.length;
    }

    let mut queue = TraversalQueue::new();
    queue.push_seed(source.root.clone());

    let temporary = ProfileData::empty_like(&segments);
    let budget = YieldBudget::new(config.filter_yield_budget_ms);

    Ok(Self {
      id: RequestId::new(),
      width: profile.width(),
      segments,
      base_mileage,
      max_depth: config.max_depth,
      config,
      points_served: 0,
      highest_level_served: 0,
      cancel_requested: false,
      queue,
      served: HashSet::new(),
      temporary,
      phase: Phase::Traversing,
      budget,
      lru,
      callbacks,
      stats: RequestStats::default(),
      source,
    })
  }

  pub fn id(&self) -> RequestId {
    self.id
  }

  pub fn source_id(&self) -> crate::octree::SourceId {
    self.source.id
  }

  pub fn stats(&self) -> RequestStats {
    self.stats
  }

  pub fn points_served(&self) -> usize {
    self.points_served
  }

  pub fn highest_level_served(&self) -> u32 {
    self.highest_level_served
  }

  pub fn cancel_requested(&self) -> bool {
    self.cancel_requested
  }

  pub fn is_done(&self) -> bool {
    matches!(self.phase, Phase::Done(_))
  }

  pub fn is_finished(&self) -> bool {
    matches!(self.phase, Phase::Done(UpdateStatus::Finished))
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self.phase, Phase::Done(UpdateStatus::Cancelled))
  }

  /// Advance the request by one cooperative tick.
  ///
  /// Terminal requests are no-ops and keep returning their final status.
  pub fn update(&mut self) -> UpdateStatus {
    if let Phase::Done(status) = &self.phase {
      return *status;
    }
    self.budget.reset();

    let mut promotions = 0usize;
    loop {
      if matches!(self.phase, Phase::Filtering { .. }) {
        match self.filter_step() {
          FilterOutcome::Yielded => return UpdateStatus::Working,
          FilterOutcome::Consumed => {
            if promotions >= self.config.max_nodes_per_update {
              return UpdateStatus::Working;
            }
          }
          FilterOutcome::Failed(status) => return status,
        }
        continue;
      }

      match self.traverse_step() {
        TraverseOutcome::Promoted => promotions += 1,
        TraverseOutcome::AwaitingLoad => return UpdateStatus::Working,
        TraverseOutcome::Drained(status) => return status,
      }
    }
  }

  /// Immediate cancellation: the queue is dropped and `on_cancel` fires.
  /// Idempotent; later calls and ticks are no-ops.
  pub fn cancel(&mut self) {
    if self.is_done() {
      return;
    }
    self.queue.clear();
    self.phase = Phase::Done(UpdateStatus::Cancelled);
    debug!(request = self.id.raw(), "profile request cancelled");
    (self.callbacks.on_cancel)(self.id, None);
  }

  /// Graceful cancellation: clamp the depth to what has already been
  /// served so queued deeper nodes are discarded on pop and the request
  /// drains into `on_finish`.
  pub fn finish_level_then_cancel(&mut self) {
    if self.is_done() {
      return;
    }
    self.max_depth = self.highest_level_served;
    self.cancel_requested = true;
    debug!(
      request = self.id.raw(),
      max_depth = self.max_depth,
      "finishing current level, then stopping"
    );
  }

  fn traverse_step(&mut self) -> TraverseOutcome {
    loop {
      let Some((node, weight)) = self.queue.pop() else {
        return TraverseOutcome::Drained(self.finalize());
      };
      if node.level > self.max_depth {
        continue;
      }
      if self.served.contains(&node_id(&node)) {
        continue;
      }

      if !node.is_loaded() {
        node.load(&self.source.loader());
        match node.poll_loaded() {
          Ok(true) => {}
          Ok(false) => {
            self.stats.loads_awaited += 1;
            self.queue.push(node, weight);
            return TraverseOutcome::AwaitingLoad;
          }
          Err(error) => {
            warn!(node = %node.name, "skipping unloadable node: {error}");
            self.stats.nodes_skipped += 1;
            continue;
          }
        }
      }

      self.served.insert(node_id(&node));
      if let Some(lru) = &self.lru {
        lru.touch(&node);
      }
      self.highest_level_served = self.highest_level_served.max(node.level);
      self.stats.nodes_served += 1;
      self.expand(&node);

      let has_geometry = node.points().is_some_and(|payload| {
        payload
          .column(PointAttribute::Position)
          .and_then(|column| column.data.as_f32())
          .is_some_and(|positions| !positions.is_empty())
      });
      if !has_geometry {
        if node.num_points > 0 {
          let error = ProfileError::EmptyGeometry {
            level: node.level,
            num_points: node.num_points,
          };
          warn!(node = %node.name, "skipping node: {error}");
          self.stats.nodes_skipped += 1;
        }
        continue;
      }

      self.phase = Phase::Filtering {
        node,
        segment_index: 0,
        cursor: FilterCursor::new(),
      };
      return TraverseOutcome::Promoted;
    }
  }

  /// Push the node's children that can reach the corridor. Expansion only
  /// happens at materialized hierarchy layers.
  fn expand(&mut self, node: &NodeRef) {
    let step = node.hierarchy_step_size.max(1);
    if !(node.level == 0 || (node.level % step == 0 && node.has_children())) {
      return;
    }
    let world = self.source.world_matrix();
    for child in node.children() {
      if child.level > self.max_depth {
        continue;
      }
      let sphere = child.bounding_sphere.transformed(&world);
      let reachable = self
        .segments
        .iter()
        .any(|segment| segment.corridor_intersects_sphere(&sphere, self.width));
      if reachable {
        // Priority is the world-space radius, the same sphere the
        // intersection test ran against.
        let weight = sphere.radius;
        self.queue.push(child, weight);
      }
    }
  }

  fn filter_step(&mut self) -> FilterOutcome {
    let Phase::Filtering {
      node,
      mut segment_index,
      mut cursor,
    } = std::mem::replace(&mut self.phase, Phase::Traversing)
    else {
      return FilterOutcome::Consumed;
    };

    let Some(payload) = node.points() else {
      return FilterOutcome::Consumed;
    };
    let Some(positions) = payload
      .column(PointAttribute::Position)
      .and_then(|column| column.data.as_f32())
    else {
      return FilterOutcome::Consumed;
    };
    let world = self.source.world_matrix();

    loop {
      if segment_index >= self.segments.len() {
        self.maybe_emit(false);
        return FilterOutcome::Consumed;
      }

      let segment = &self.segments[segment_index];
      let step = filter_segment(
        &mut cursor,
        positions,
        node.bounding_box.min,
        &world,
        segment,
        self.width,
        self.base_mileage[segment_index],
        &mut self.budget,
      );
      match step {
        FilterStep::NotDone => {
          self.stats.filter_yields += 1;
          self.phase = Phase::Filtering {
            node,
            segment_index,
            cursor,
          };
          return FilterOutcome::Yielded;
        }
        FilterStep::Done(batch) => {
          if let Err(error) = self.absorb(segment_index, &payload, batch) {
            return FilterOutcome::Failed(self.fail(error));
          }
          segment_index += 1;
          cursor = FilterCursor::new();

          // Suspension point between segments.
          if segment_index < self.segments.len() && self.budget.exhausted() {
            self.budget.reset();
            self.stats.filter_yields += 1;
            self.phase = Phase::Filtering {
              node,
              segment_index,
              cursor,
            };
            return FilterOutcome::Yielded;
          }
        }
      }
    }
  }

  /// Move one segment's survivors into the pending emission, copying the
  /// node's other attribute columns by accepted index.
  fn absorb(
    &mut self,
    segment_index: usize,
    payload: &TypedPointBuffer,
    batch: crate::filter::AcceptedBatch,
  ) -> Result<(), ProfileError> {
    let count = batch.indices.len();
    if count == 0 {
      return Ok(());
    }
    self.stats.points_accepted += count;

    let mut accepted = TypedPointBuffer::new();
    accepted.insert_column(PointAttribute::Position, AttributeData::F32(batch.positions));
    accepted.insert_column(PointAttribute::Mileage, AttributeData::F64(batch.mileage));
    for (kind, column) in payload.columns() {
      if kind == PointAttribute::Position || kind == PointAttribute::Mileage {
        continue;
      }
      accepted.insert_column_with_stride(
        kind,
        column.data.gather(&batch.indices, column.stride),
        column.stride,
      );
    }
    accepted.union_bounds(&batch.bounds);

    self.temporary.segments[segment_index].points.append(&accepted)
  }

  /// Hand the pending emission to `on_progress` once it is worth shipping.
  fn maybe_emit(&mut self, force: bool) {
    let size = self.temporary.size();
    if size == 0 || (!force && size <= EMIT_MIN_POINTS) {
      return;
    }
    let data = std::mem::replace(&mut self.temporary, ProfileData::empty_like(&self.segments));
    self.points_served += size;
    (self.callbacks.on_progress)(self.id, data);
  }

  fn finalize(&mut self) -> UpdateStatus {
    self.maybe_emit(true);
    debug!(
      request = self.id.raw(),
      points = self.points_served,
      nodes = self.stats.nodes_served,
      "profile request finished"
    );
    self.phase = Phase::Done(UpdateStatus::Finished);
    (self.callbacks.on_finish)(self.id);
    UpdateStatus::Finished
  }

  fn fail(&mut self, error: ProfileError) -> UpdateStatus {
    warn!(request = self.id.raw(), "profile request failed: {error}");
    self.queue.clear();
    self.phase = Phase::Done(UpdateStatus::Cancelled);
    (self.callbacks.on_cancel)(self.id, Some(error));
    UpdateStatus::Cancelled
  }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod request_test;
