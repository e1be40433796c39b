//! profile_core - cross-section extraction for streaming point-cloud octrees
//!
//! Given a polyline of markers and a corridor width, this crate
//! incrementally pulls every point inside the swept corridor out of one or
//! more out-of-core octrees, projects survivors into cross-section
//! coordinates (mileage along the polyline x elevation), and hands batches
//! to downstream consumers as finer octree nodes stream in.
//!
//! # Features
//!
//! - **Coarse-to-fine streaming**: a priority queue serves large-radius
//!   nodes first, so a complete-but-blurry profile appears quickly and
//!   refines progressively
//! - **Cooperative scheduling**: traversal and filtering run on the host
//!   thread in budgeted ticks; node payloads load asynchronously on the
//!   rayon pool
//! - **Debounced invalidation**: marker edits coalesce, cancel in-flight
//!   work at a safe boundary, and restart from the root
//! - **Columnar output**: projected points land in fixed-capacity batches
//!   sized for GPU upload
//!
//! # Example
//!
//! ```ignore
//! use profile_core::{Profile, ProfileConfig, ProfileController};
//!
//! let mut controller = ProfileController::new(ProfileConfig::default());
//! controller.add_pointcloud(source);
//!
//! let mut profile = Profile::new(2.0);
//! profile.add_marker(start);
//! profile.add_marker(end);
//! controller.set_profile(profile);
//!
//! // Each frame:
//! controller.update();
//! for entry in controller.entries() {
//!     for batch in entry.batches() {
//!         // upload batch.positions() etc.
//!     }
//! }
//! ```

pub mod attributes;
pub mod config;
pub mod error;
pub mod events;
pub mod geom;

// Re-export commonly used items
pub use attributes::{AttributeData, ElementType, PointAttribute};
pub use config::ProfileConfig;
pub use error::ProfileError;
pub use events::{ControllerEvent, ProfileEvent, Publisher};
pub use geom::{Aabb3, Plane, Sphere};

// Columnar point storage
pub mod buffer;
pub use buffer::{Column, TypedPointBuffer};

// Profile polyline and derived corridor geometry
pub mod profile;
pub use profile::{Profile, ProfileData, Segment};

// Octree surface: nodes, sources, shared cache
pub mod octree;
pub use octree::{NodeLoader, NodeLru, NodeRef, OctreeNode, PointCloudSource, SourceId};

// Coarse-to-fine traversal queue
pub mod queue;
pub use queue::TraversalQueue;

// Cooperative segment filter
pub mod filter;
pub use filter::{filter_segment, AcceptedBatch, FilterCursor, FilterStep, YieldBudget};

// Per-source request state machine
pub mod request;
pub use request::{ProfileRequest, RequestCallbacks, RequestId, RequestStats, UpdateStatus};

// Debounce, aggregation, scale
pub mod controller;
pub use controller::{ProfileController, SectionView};

// Batched projected output
pub mod entry;
pub use entry::{BatchPool, PointBatch, ProjectedEntry};

// Shared test fixtures
#[cfg(test)]
pub mod test_utils;
