//! octnav - octree free-flight navigation for 3D volumes
//!
//! Builds a sparse octree over a navigable box from a collision-query
//! collaborator, links adjacent free leaves across depths, and plans paths
//! for flying agents with A* over the leaf graph followed by line-of-sight
//! smoothing. Geometry changes rebuild only the affected regions and publish
//! a new immutable generation; queries in flight keep the one they started on.
//!
//! # Features
//!
//! - **Sparse octree**: uniform regions stay coarse, cluttered ones subdivide to
//!   the configured depth
//! - **Cross-depth adjacency**: face, edge and corner links between leaves of
//!   any size
//! - **Radius-aware planning**: per-query clearance, no per-radius rebuild
//! - **Live updates**: copy-on-write arena pages shared between generations
//! - **Query service**: prioritized, bounded, cancellable queries on rayon
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use octnav::{BoxField, NavConfig, DAabb3, UpdateManager, PathRequest};
//!
//! let geometry = Arc::new(BoxField::new());
//! let config = NavConfig::new(DAabb3::new(DVec3::ZERO, DVec3::splat(128.0)), 6);
//! let manager = UpdateManager::build(&config, geometry.clone())?;
//!
//! let path = octnav::plan_path(
//!     &manager.snapshot(),
//!     &PathRequest::new(start, goal),
//!     &PlannerSettings::DEFAULT,
//!     &CancelToken::new(),
//! )?;
//!
//! // A door closes
//! geometry.insert(door);
//! manager.notify(door)?;
//! if manager.is_path_stale(&path) { /* replan */ }
//! ```

pub mod error;
pub mod geometry;
pub mod metrics;
pub mod octree;
pub mod planner;
pub mod service;
pub mod settings;
pub mod smoother;
pub mod update;

// Re-export commonly used items
pub use error::{Endpoint, EndpointReason, GeometryError, NavError, NavResult};
pub use geometry::{BoxField, CollisionQuery, EmptyWorld, SolidId};
pub use octree::{
  build_volume, AdjacencyKind, BuildStats, Connectivity, DAabb3, MixedLeafPolicy, NavConfig,
  NavVolume, NodeId, Occupancy, VolumeId,
};
pub use planner::{
  plan_path, AdjacencyFilter, CancelToken, NavPath, PathRequest, PathResult, PathStatus,
  PlannerSettings, SearchStats,
};
pub use service::{PathTicket, QueryPriority, QueryService, ServiceSettings, TicketId};
pub use settings::NavSettings;
pub use update::{UpdateManager, UpdateReport};

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
mod scenario_test;
