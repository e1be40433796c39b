//! The profile polyline: markers, width, and mutation events.

use crossbeam_channel::Receiver;
use glam::DVec3;

use crate::events::{ProfileEvent, Publisher};

use super::Segment;

/// Polyline of markers with a corridor width and a cross-section height.
///
/// Every mutation publishes one [`ProfileEvent`]; the controller subscribes
/// and reruns extraction. Segments are derived on demand so the marker list
/// is the only mutable state.
pub struct Profile {
  markers: Vec<DVec3>,
  width: f64,
  height: f64,
  events: Publisher<ProfileEvent>,
}

impl Profile {
  pub fn new(width: f64) -> Self {
    assert!(width > 0.0, "profile width must be positive");
    Self {
      markers: Vec::new(),
      width,
      height: 10.0,
      events: Publisher::new(),
    }
  }

  /// Subscribe to mutation events. Dropping the receiver unsubscribes.
  pub fn subscribe(&mut self) -> Receiver<ProfileEvent> {
    self.events.subscribe()
  }

  pub fn markers(&self) -> &[DVec3] {
    &self.markers
  }

  pub fn marker_count(&self) -> usize {
    self.markers.len()
  }

  pub fn width(&self) -> f64 {
    self.width
  }

  pub fn height(&self) -> f64 {
    self.height
  }

  /// At least two markers and a positive width.
  pub fn is_valid(&self) -> bool {
    self.markers.len() >= 2 && self.width > 0.0
  }

  /// Append a marker. Emits a single `MarkerAdded`.
  pub fn add_marker(&mut self, position: DVec3) {
    self.markers.push(position);
    let index = self.markers.len() - 1;
    self.events.publish(ProfileEvent::MarkerAdded { index });
  }

  /// Insert a marker before `index`.
  ///
  /// # Panics
  /// Panics if `index > marker_count()`.
  pub fn insert_marker(&mut self, index: usize, position: DVec3) {
    self.markers.insert(index, position);
    self.events.publish(ProfileEvent::MarkerAdded { index });
  }

  /// Move an existing marker.
  ///
  /// # Panics
  /// Panics if `index` is out of range.
  pub fn move_marker(&mut self, index: usize, position: DVec3) {
    assert!(index < self.markers.len(), "marker index out of range");
    self.markers[index] = position;
    self.events.publish(ProfileEvent::MarkerMoved { index });
  }

  /// Remove a marker.
  ///
  /// # Panics
  /// Panics if `index` is out of range.
  pub fn remove_marker(&mut self, index: usize) {
    assert!(index < self.markers.len(), "marker index out of range");
    self.markers.remove(index);
    self.events.publish(ProfileEvent::MarkerRemoved { index });
  }

  /// Set the corridor width.
  ///
  /// # Panics
  /// Panics if `width <= 0`.
  pub fn set_width(&mut self, width: f64) {
    assert!(width > 0.0, "profile width must be positive");
    self.width = width;
    self.events.publish(ProfileEvent::WidthChanged { width });
  }

  /// Set the cross-section height. Carried on the public shape; the filter
  /// does not consume it.
  pub fn set_height(&mut self, height: f64) {
    self.height = height;
  }

  /// Derive one segment per consecutive marker pair.
  pub fn derive_segments(&self) -> Vec<Segment> {
    self
      .markers
      .windows(2)
      .map(|pair| Segment::between(pair[0], pair[1]))
      .collect()
  }
}
