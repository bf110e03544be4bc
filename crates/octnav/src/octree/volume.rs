//! NavVolume - one immutable, published generation of the navigation index.
//!
//! A volume owns its node arena. Nothing mutates it after construction; the
//! update path produces a new volume that shares unchanged arena pages.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::DVec3;

use super::arena::{NavNode, NodeArena, NodeId};
use super::classify::Occupancy;
use super::{DAabb3, NavConfig};
use crate::error::{Endpoint, EndpointReason, NavError, NavResult};

// =============================================================================
// VolumeId - unique identifier
// =============================================================================

/// Atomic counter for generating unique VolumeIds.
static VOLUME_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one lineage of generations (one build and all of its updates).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct VolumeId(u64);

impl VolumeId {
  /// Generate a new unique VolumeId.
  pub fn new() -> Self {
    Self(VOLUME_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  /// Get the raw ID value.
  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl Default for VolumeId {
  fn default() -> Self {
    Self::new()
  }
}

// =============================================================================
// BuildStats
// =============================================================================

/// Node and link counts for a generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
  /// Live nodes in the arena.
  pub nodes: usize,
  pub free_leaves: usize,
  pub blocked_leaves: usize,
  pub mixed_nodes: usize,
  /// Directed link count (each symmetric pair counts twice).
  pub links: usize,
  /// Wall time of the build or update that produced this generation.
  pub elapsed_us: u64,
}

impl BuildStats {
  /// Count nodes by occupancy.
  pub fn from_arena(arena: &NodeArena, links: usize, elapsed_us: u64) -> Self {
    let mut stats = Self {
      links,
      elapsed_us,
      ..Default::default()
    };
    for (_, node) in arena.iter() {
      stats.nodes += 1;
      match (node.occupancy, node.is_leaf()) {
        (Occupancy::Free, true) => stats.free_leaves += 1,
        (Occupancy::Blocked, true) => stats.blocked_leaves += 1,
        (Occupancy::Mixed, _) => stats.mixed_nodes += 1,
        _ => {}
      }
    }
    stats
  }
}

// =============================================================================
// NavVolume
// =============================================================================

/// Immutable navigation snapshot.
#[derive(Clone, Debug)]
pub struct NavVolume {
  config: Arc<NavConfig>,
  id: VolumeId,
  generation: u64,
  arena: NodeArena,
  root: NodeId,
  stats: BuildStats,
}

impl NavVolume {
  pub(crate) fn from_parts(
    config: NavConfig,
    id: VolumeId,
    generation: u64,
    arena: NodeArena,
    root: NodeId,
    stats: BuildStats,
  ) -> Self {
    Self {
      config: Arc::new(config),
      id,
      generation,
      arena,
      root,
      stats,
    }
  }

  pub(crate) fn with_arena(&self, generation: u64, arena: NodeArena, stats: BuildStats) -> Self {
    Self {
      config: Arc::clone(&self.config),
      id: self.id,
      generation,
      arena,
      root: self.root,
      stats,
    }
  }

  #[inline]
  pub fn config(&self) -> &NavConfig {
    &self.config
  }

  #[inline]
  pub fn id(&self) -> VolumeId {
    self.id
  }

  #[inline]
  pub fn generation(&self) -> u64 {
    self.generation
  }

  #[inline]
  pub fn bounds(&self) -> DAabb3 {
    self.config.bounds
  }

  #[inline]
  pub fn max_depth(&self) -> u8 {
    self.config.max_depth
  }

  /// Size of a max-depth leaf.
  #[inline]
  pub fn leaf_voxel_size(&self) -> DVec3 {
    self.config.leaf_size()
  }

  #[inline]
  pub fn root(&self) -> NodeId {
    self.root
  }

  #[inline]
  pub fn stats(&self) -> &BuildStats {
    &self.stats
  }

  #[inline]
  pub fn arena(&self) -> &NodeArena {
    &self.arena
  }

  #[inline]
  pub fn node(&self, id: NodeId) -> Option<&NavNode> {
    self.arena.get(id)
  }

  /// World-space bounds of a node.
  pub fn node_bounds(&self, id: NodeId) -> Option<DAabb3> {
    self.node(id).map(|n| self.config.cell_bounds(&n.cell))
  }

  /// World-space center of a node.
  pub fn node_center(&self, id: NodeId) -> Option<DVec3> {
    self.node(id).map(|n| self.config.cell_center(&n.cell))
  }

  /// Iterate all leaves.
  pub fn leaves(&self) -> impl Iterator<Item = (NodeId, &NavNode)> + '_ {
    self.arena.iter().filter(|(_, n)| n.is_leaf())
  }

  /// Iterate Free leaves.
  pub fn free_leaves(&self) -> impl Iterator<Item = (NodeId, &NavNode)> + '_ {
    self.arena.iter().filter(|(_, n)| n.is_free_leaf())
  }

  /// Leaf containing `point`, by descent from the root.
  ///
  /// Returns None when the point lies outside the volume.
  pub fn locate_leaf(&self, point: DVec3) -> Option<NodeId> {
    let target = self.config.cell_at_point(point, self.config.max_depth)?;
    let mut current = self.root;
    loop {
      let node = self.arena.get(current)?;
      match node.children {
        None => return Some(current),
        Some(children) => {
          let next = target.ancestor_at(node.cell.depth + 1)?;
          current = children[next.octant_in_parent() as usize];
        }
      }
    }
  }

  /// Free leaf containing an endpoint, or the reason it cannot be used.
  pub fn endpoint_leaf(&self, point: DVec3, endpoint: Endpoint) -> NavResult<NodeId> {
    let id = self
      .locate_leaf(point)
      .ok_or(NavError::endpoint(endpoint, EndpointReason::OutsideVolume))?;
    match self.arena.get(id) {
      Some(node) if node.is_free_leaf() => Ok(id),
      _ => Err(NavError::endpoint(endpoint, EndpointReason::Blocked)),
    }
  }

  /// True when any Blocked leaf's interior overlaps `region`.
  pub fn any_blocked_within(&self, region: &DAabb3) -> bool {
    let mut stack = vec![self.root];
    while let Some(id) = stack.pop() {
      let Some(node) = self.arena.get(id) else {
        continue;
      };
      let bounds = self.config.cell_bounds(&node.cell);
      if !bounds.overlaps_interior(region) {
        continue;
      }
      match node.children {
        Some(children) => stack.extend_from_slice(&children),
        None if node.occupancy == Occupancy::Blocked => return true,
        None => {}
      }
    }
    false
  }

  /// True when the segment `a -> b`, swept by `radius`, stays out of every Blocked leaf.
  ///
  /// Blocked boxes are inflated by the radius. Grazing a box surface is allowed.
  pub fn segment_clear(&self, a: DVec3, b: DVec3, radius: f64) -> bool {
    let radius = radius.max(0.0);
    let mut stack = vec![self.root];
    while let Some(id) = stack.pop() {
      let Some(node) = self.arena.get(id) else {
        continue;
      };
      if node.occupancy == Occupancy::Free {
        continue;
      }
      let bounds = self.config.cell_bounds(&node.cell).expanded(radius);
      if !bounds.segment_hits_interior(a, b) {
        continue;
      }
      match node.children {
        Some(children) => stack.extend_from_slice(&children),
        None => return false,
      }
    }
    true
  }

  /// Breadth-first flood fill over the adjacency graph.
  ///
  /// Returns centers of Free leaves reachable from `origin` whose center lies
  /// within `max_distance` of it, in visiting order, capped at `max_points`.
  /// The leaf containing `origin` is always the first point. The search does not
  /// continue through leaves that are out of range.
  pub fn flood_fill(
    &self,
    origin: DVec3,
    max_distance: f64,
    max_points: usize,
  ) -> NavResult<Vec<DVec3>> {
    let start = self.endpoint_leaf(origin, Endpoint::Start)?;
    let mut points = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(id) = queue.pop_front() {
      if points.len() >= max_points {
        break;
      }
      let Some(node) = self.arena.get(id) else {
        continue;
      };
      let center = self.config.cell_center(&node.cell);
      if center.distance(origin) > max_distance && id != start {
        continue;
      }
      points.push(center);
      for link in &node.links {
        if seen.insert(link.node) {
          queue.push_back(link.node);
        }
      }
    }
    Ok(points)
  }
}

#[cfg(test)]
#[path = "volume_test.rs"]
mod volume_test;
