//! Sparse octree over the navigable volume.
//!
//! Nodes live in a paged arena addressed by stable [`NodeId`]s. Parent, child
//! and neighbor relationships are index lookups, never owning references.
//!
//! # Depth Convention
//!
//! Depth 0 = the whole volume (root), higher depth = finer.
//!
//! ```text
//! Cell Size = bounds.size / 2^depth
//! ```
//!
//! # Module Structure
//!
//! - [`cell`]: `CellKey` - grid position + depth value type
//! - [`config`]: `NavConfig` - bounds, depth and coordinate math
//! - [`classify`]: collision coverage -> Free / Blocked / Mixed
//! - [`builder`]: parallel recursive subdivision
//! - [`adjacency`]: face / edge / corner links between Free leaves
//! - [`arena`]: paged copy-on-write node storage
//! - [`volume`]: `NavVolume` - one published generation
//! - [`rebuild`]: region-scoped re-classification for updates

pub mod adjacency;
pub mod arena;
pub mod bounds;
pub mod builder;
pub mod cell;
pub mod classify;
pub mod config;
pub mod rebuild;
pub mod volume;

// Re-exports
pub use adjacency::AdjacencyKind;
pub use arena::{NavNode, NeighborLink, NodeArena, NodeId};
pub use bounds::DAabb3;
pub use builder::build_volume;
pub use cell::CellKey;
pub use classify::Occupancy;
pub use config::{Connectivity, MixedLeafPolicy, NavConfig};
pub use rebuild::RebuildStats;
pub use volume::{BuildStats, NavVolume, VolumeId};
