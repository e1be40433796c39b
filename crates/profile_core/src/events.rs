//! Typed event publishers.
//!
//! Each event kind travels over its own channel type instead of a dynamic
//! string-keyed bus. Subscribers hold plain receivers; dropping a receiver
//! unsubscribes it, so there is no cyclic ownership between the profile and
//! the controller.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::octree::SourceId;

/// Mutation events emitted by a [`Profile`](crate::profile::Profile).
#[derive(Clone, Debug, PartialEq)]
pub enum ProfileEvent {
  MarkerAdded { index: usize },
  MarkerMoved { index: usize },
  MarkerRemoved { index: usize },
  WidthChanged { width: f64 },
}

/// Aggregation events emitted by the controller.
#[derive(Clone, Debug, PartialEq)]
pub enum ControllerEvent {
  /// Points for one segment of one source landed in its projected entry.
  SegmentRecomputed {
    source: SourceId,
    segment: usize,
    points: usize,
  },
  /// A progress batch was fully aggregated.
  RecomputeFinished,
}

/// Multi-subscriber publisher for one event type.
pub struct Publisher<T> {
  subscribers: Vec<Sender<T>>,
}

impl<T: Clone> Publisher<T> {
  pub fn new() -> Self {
    Self {
      subscribers: Vec::new(),
    }
  }

  /// Register a new subscriber. Dropping the receiver unsubscribes it.
  pub fn subscribe(&mut self) -> Receiver<T> {
    let (sender, receiver) = unbounded();
    self.subscribers.push(sender);
    receiver
  }

  /// Deliver an event to every live subscriber, pruning dead ones.
  pub fn publish(&mut self, event: T) {
    self
      .subscribers
      .retain(|subscriber| subscriber.send(event.clone()).is_ok());
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.len()
  }
}

impl<T: Clone> Default for Publisher<T> {
  fn default() -> Self {
    Self::new()
  }
}
