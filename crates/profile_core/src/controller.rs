//! Orchestrates extraction across sources: debounced recompute, request
//! lifecycle, aggregation into projected entries, and cross-section scale.
//!
//! The controller is tick-driven like its requests: the host calls `update`
//! once per frame. Marker edits arrive through the profile's event channel;
//! request results arrive through an internal signal channel, so no
//! callback ever borrows the controller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::DVec3;
use tracing::{debug, warn};
use web_time::Instant;

use crate::config::ProfileConfig;
use crate::entry::{BatchPool, ProjectedEntry};
use crate::error::ProfileError;
use crate::events::{ControllerEvent, ProfileEvent, Publisher};
use crate::geom::Aabb3;
use crate::octree::{NodeLru, PointCloudSource, SourceId};
use crate::profile::{Profile, ProfileData};
use crate::request::{ProfileRequest, RequestCallbacks, RequestId};

/// Orthographic framing of the projected box for an external camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionView {
  /// Center of the projected box (mileage, 0, elevation).
  pub center: DVec3,
  /// World-units half extent along mileage.
  pub half_width: f64,
  /// World-units half extent along elevation.
  pub half_height: f64,
  /// Uniform pixels-per-world-unit scale.
  pub scale: f64,
}

enum RequestSignal {
  Progress { source: SourceId, data: ProfileData },
  Finished { request: RequestId },
  Cancelled { request: RequestId, reason: Option<ProfileError> },
}

/// Debounced multi-source profile extraction front end.
pub struct ProfileController {
  config: ProfileConfig,
  profile: Option<Profile>,
  profile_events: Option<Receiver<ProfileEvent>>,
  sources: Vec<Arc<PointCloudSource>>,
  requests: Vec<ProfileRequest>,
  entries: HashMap<SourceId, ProjectedEntry>,
  pool: BatchPool,
  lru: Option<Arc<NodeLru>>,
  events: Publisher<ControllerEvent>,
  signal_tx: Sender<RequestSignal>,
  signals: Receiver<RequestSignal>,
  last_recompute: Option<Instant>,
  pending_recompute: bool,
  level_finish_sent: bool,
  projected_box: Aabb3,
  accumulated_points: usize,
}

impl ProfileController {
  pub fn new(config: ProfileConfig) -> Self {
    let (signal_tx, signals) = unbounded();
    Self {
      pool: BatchPool::new(config.batch_capacity),
      config,
      profile: None,
      profile_events: None,
      sources: Vec::new(),
      requests: Vec::new(),
      entries: HashMap::new(),
      lru: None,
      events: Publisher::new(),
      signal_tx,
      signals,
      last_recompute: None,
      pending_recompute: false,
      level_finish_sent: false,
      projected_box: Aabb3::EMPTY,
      accumulated_points: 0,
    }
  }

  /// Share the renderer's node cache so served nodes resist eviction.
  pub fn with_node_lru(mut self, lru: Arc<NodeLru>) -> Self {
    self.lru = Some(lru);
    self
  }

  /// Subscribe to aggregation events.
  pub fn subscribe(&mut self) -> Receiver<ControllerEvent> {
    self.events.subscribe()
  }

  /// Install the profile and subscribe to its mutation events, then kick
  /// off an extraction.
  pub fn set_profile(&mut self, mut profile: Profile) {
    self.profile_events = Some(profile.subscribe());
    self.profile = Some(profile);
    self.recompute();
  }

  pub fn profile(&self) -> Option<&Profile> {
    self.profile.as_ref()
  }

  /// Mutable access for marker editing; edits flow back in through the
  /// event subscription on the next `update`.
  pub fn profile_mut(&mut self) -> Option<&mut Profile> {
    self.profile.as_mut()
  }

  pub fn add_pointcloud(&mut self, source: Arc<PointCloudSource>) {
    self.sources.push(source);
    self.recompute();
  }

  /// Drop a source: cancel its requests, recycle its batches.
  pub fn remove_pointcloud(&mut self, id: SourceId) {
    for request in &mut self.requests {
      if request.source_id() == id {
        request.cancel();
      }
    }
    self.requests.retain(|request| !request.is_done());
    if let Some(entry) = self.entries.remove(&id) {
      entry.recycle(&mut self.pool);
    }
    self.sources.retain(|source| source.id != id);
    self.projected_box = self
      .entries
      .values()
      .fold(Aabb3::EMPTY, |mut aabb, entry| {
        aabb.union(&entry.projected_box());
        aabb
      });
  }

  /// Request a fresh extraction.
  ///
  /// Leading-edge debounce: runs immediately when outside the window;
  /// inside it, arms one trailing run that `update` fires once the window
  /// elapses. Bursts of marker edits collapse into at most one deferred
  /// recompute.
  pub fn recompute(&mut self) {
    let now = Instant::now();
    if let Some(last) = self.last_recompute {
      if now.duration_since(last) < Duration::from_millis(self.config.debounce_ms) {
        self.pending_recompute = true;
        return;
      }
    }
    self.run_recompute(now);
  }

  fn run_recompute(&mut self, now: Instant) {
    self.pending_recompute = false;
    self.level_finish_sent = false;
    self.cancel_requests();
    self.clear_results();

    let Some(profile) = &self.profile else {
      return;
    };
    if !profile.is_valid() {
      debug!("recompute skipped: profile has no corridor yet");
      return;
    }
    // Only an actual run opens a debounce window.
    self.last_recompute = Some(now);

    for source in &self.sources {
      if !source.is_visible() {
        continue;
      }
      if !source.node_intersects_profile(&source.root, profile) {
        debug!(source = source.id.raw(), "source skipped: root outside the corridor");
        continue;
      }
      let source_id = source.id;
      let progress_tx = self.signal_tx.clone();
      let finish_tx = self.signal_tx.clone();
      let cancel_tx = self.signal_tx.clone();
      let callbacks = RequestCallbacks {
        on_progress: Box::new(move |_, data| {
          let _ = progress_tx.send(RequestSignal::Progress {
            source: source_id,
            data,
          });
        }),
        on_finish: Box::new(move |request| {
          let _ = finish_tx.send(RequestSignal::Finished { request });
        }),
        on_cancel: Box::new(move |request, reason| {
          let _ = cancel_tx.send(RequestSignal::Cancelled { request, reason });
        }),
      };
      match source.get_points_inside_profile(profile, self.config, self.lru.clone(), callbacks) {
        Ok(request) => self.requests.push(request),
        Err(error) => debug!(source = source_id.raw(), "request not started: {error}"),
      }
    }
    debug!(requests = self.requests.len(), "profile recompute started");
  }

  /// Advance the controller by one frame: apply marker edits, fire a due
  /// trailing recompute, tick every live request, aggregate results, and
  /// enforce the point threshold.
  pub fn update(&mut self) {
    let profile_mutated = match &self.profile_events {
      Some(receiver) => receiver.try_iter().count() > 0,
      None => false,
    };
    if profile_mutated {
      self.recompute();
    }

    if self.pending_recompute {
      let now = Instant::now();
      let due = self.last_recompute.map_or(true, |last| {
        now.duration_since(last) >= Duration::from_millis(self.config.debounce_ms)
      });
      if due {
        self.run_recompute(now);
      }
    }

    for request in &mut self.requests {
      request.update();
    }
    self.requests.retain(|request| !request.is_done());

    while let Ok(signal) = self.signals.try_recv() {
      match signal {
        RequestSignal::Progress { source, data } => self.aggregate(source, data),
        RequestSignal::Finished { .. } => {}
        RequestSignal::Cancelled {
          request,
          reason: Some(error),
        } => warn!(request = request.raw(), "profile request failed: {error}"),
        RequestSignal::Cancelled { .. } => {}
      }
    }

    if !self.level_finish_sent && self.accumulated_points > self.config.threshold {
      self.finish_level_then_cancel();
    }
  }

  /// Ask every live request to finish its current refinement level and
  /// stop there.
  pub fn finish_level_then_cancel(&mut self) {
    self.level_finish_sent = true;
    for request in &mut self.requests {
      request.finish_level_then_cancel();
    }
  }

  /// Cancel everything and drop accumulated results and scale state.
  pub fn reset(&mut self) {
    self.cancel_requests();
    self.clear_results();
    self.pending_recompute = false;
    self.last_recompute = None;
    self.level_finish_sent = false;
  }

  pub fn projected_box(&self) -> Aabb3 {
    self.projected_box
  }

  pub fn accumulated_points(&self) -> usize {
    self.accumulated_points
  }

  pub fn live_request_count(&self) -> usize {
    self.requests.len()
  }

  /// True while a trailing debounced recompute is armed.
  pub fn pending_recompute(&self) -> bool {
    self.pending_recompute
  }

  pub fn entry(&self, id: SourceId) -> Option<&ProjectedEntry> {
    self.entries.get(&id)
  }

  pub fn entries(&self) -> impl Iterator<Item = &ProjectedEntry> {
    self.entries.values()
  }

  /// Fit the projected box into a `width x height` viewport.
  ///
  /// Returns the uniform scale `min(width / mileage span, height /
  /// elevation span)` and the half extents an orthographic camera should
  /// adopt around the box center. `None` until something was projected.
  pub fn set_scale_from_dimensions(&self, width: f64, height: f64) -> Option<SectionView> {
    if self.projected_box.is_empty() {
      return None;
    }
    let span = self.projected_box.size();
    let sx = width / span.x;
    let sy = height / span.z;
    let scale = sx.min(sy);
    if !scale.is_finite() || scale <= 0.0 {
      return None;
    }
    Some(SectionView {
      center: self.projected_box.center(),
      half_width: width * 0.5 / scale,
      half_height: height * 0.5 / scale,
      scale,
    })
  }

  fn cancel_requests(&mut self) {
    for request in &mut self.requests {
      request.cancel();
    }
    self.requests.clear();
    // Results and lifecycle signals of the old generation are stale.
    while self.signals.try_recv().is_ok() {}
  }

  fn clear_results(&mut self) {
    for (_, entry) in self.entries.drain() {
      entry.recycle(&mut self.pool);
    }
    self.projected_box = Aabb3::EMPTY;
    self.accumulated_points = 0;
  }

  fn aggregate(&mut self, source: SourceId, data: ProfileData) {
    let entry = self
      .entries
      .entry(source)
      .or_insert_with(|| ProjectedEntry::new(source, &mut self.pool));

    for (index, segment) in data.segments.iter().enumerate() {
      let count = segment.points.len();
      if count == 0 {
        continue;
      }
      entry.append(&segment.points, &mut self.pool);
      self.accumulated_points += count;
      self.events.publish(ControllerEvent::SegmentRecomputed {
        source,
        segment: index,
        points: count,
      });
    }

    self.projected_box.union(&entry.projected_box());
    self.events.publish(ControllerEvent::RecomputeFinished);
  }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;
