//! Out-of-core octree surface consumed by the profile path.
//!
//! The hierarchy and file formats live outside this crate; what the core
//! sees is a tree of [`OctreeNode`]s whose point payloads arrive
//! asynchronously, a [`PointCloudSource`] per input cloud, and the shared
//! [`NodeLru`] the renderer uses for retention.

pub mod lru;
pub mod node;
pub mod source;

pub use lru::NodeLru;
pub use node::{node_id, NodeLoader, NodeRef, OctreeNode};
pub use source::{PointCloudSource, SourceId};
