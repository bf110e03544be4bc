//! A* over the leaf adjacency graph.
//!
//! Nodes are Free leaves. A node is represented by a point: the request start
//! for the start leaf, the request goal for the goal leaf, and the leaf center
//! otherwise. Edge cost is the length of the move between those points (or a
//! fixed unit cost), and the heuristic is the weighted straight-line distance
//! to the goal. Both can be scaled down for coarse leaves, see
//! [`PlannerSettings::size_factor`].
//!
//! A move out of the start leaf or into the goal leaf may bend through that
//! leaf's center when the straight segment is blocked ([`endpoint_route`]).
//!
//! The open set is a binary heap with lazy deletion. Equal f-scores pop the
//! lower h first, then the lower `NodeId`, so a search over the same snapshot
//! always expands in the same order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use glam::DVec3;
use smallvec::{smallvec, SmallVec};

use super::clearance::ClearanceCache;
use super::request::{AdjacencyFilter, CancelToken, SearchStats};
use super::settings::PlannerSettings;
use crate::error::{NavError, NavResult};
use crate::octree::{AdjacencyKind, NavNode, NavVolume, NodeId};

/// Extra corners on a move between two endpoint-adjacent leaves.
pub type Detour = SmallVec<[DVec3; 2]>;

/// Route the move `from -> to`, bending through the endpoint leaf centers if needed.
///
/// `from_center` and `to_center` are the centers of the leaves holding `from`
/// and `to`, given only for leaves that hold a request point. A point and the
/// center of its own Free leaf lie in one convex box, so those legs are always
/// clear. Tries the straight segment first, then each center alone, then both.
/// Returns the inserted corners, or None when no variant is clear.
pub fn endpoint_route(
  volume: &NavVolume,
  from: DVec3,
  from_center: Option<DVec3>,
  to: DVec3,
  to_center: Option<DVec3>,
  sweep: f64,
) -> Option<Detour> {
  let clear = |a: DVec3, b: DVec3| volume.segment_clear(a, b, sweep);
  if clear(from, to) {
    return Some(Detour::new());
  }
  if let Some(fc) = from_center {
    if clear(fc, to) {
      return Some(smallvec![fc]);
    }
  }
  if let Some(tc) = to_center {
    if clear(from, tc) {
      return Some(smallvec![tc]);
    }
  }
  match (from_center, to_center) {
    (Some(fc), Some(tc)) if clear(fc, tc) => Some(smallvec![fc, tc]),
    _ => None,
  }
}

fn route_length(from: DVec3, detour: &[DVec3], to: DVec3) -> f64 {
  let mut length = 0.0;
  let mut prev = from;
  for &corner in detour.iter().chain(std::iter::once(&to)) {
    length += prev.distance(corner);
    prev = corner;
  }
  length
}

/// Search endpoints, resolved to leaves.
#[derive(Clone, Copy, Debug)]
pub struct Endpoints {
  pub start: DVec3,
  pub goal: DVec3,
  pub start_leaf: NodeId,
  pub goal_leaf: NodeId,
}

/// Leaf sequence found by the search.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
  /// Start leaf first, goal leaf last.
  pub leaves: Vec<NodeId>,
  pub stats: SearchStats,
}

#[derive(Clone, Copy, Debug)]
struct OpenEntry {
  f: f64,
  h: f64,
  id: NodeId,
}

impl PartialEq for OpenEntry {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for OpenEntry {
  // BinaryHeap is a max-heap; reverse so the smallest (f, h, id) pops first.
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .f
      .total_cmp(&self.f)
      .then_with(|| other.h.total_cmp(&self.h))
      .then_with(|| other.id.cmp(&self.id))
  }
}

/// Search state for one query against one snapshot.
pub struct Search<'a> {
  volume: &'a NavVolume,
  ends: Endpoints,
  radius: f64,
  filter: AdjacencyFilter,
  settings: &'a PlannerSettings,
  clearance: ClearanceCache<'a>,
  start_center: Option<DVec3>,
  goal_center: Option<DVec3>,
}

impl<'a> Search<'a> {
  pub fn new(
    volume: &'a NavVolume,
    ends: Endpoints,
    radius: f64,
    filter: AdjacencyFilter,
    settings: &'a PlannerSettings,
  ) -> Self {
    Self {
      volume,
      ends,
      radius: radius.max(0.0),
      filter,
      settings,
      clearance: ClearanceCache::new(volume, radius),
      start_center: volume.node_center(ends.start_leaf),
      goal_center: volume.node_center(ends.goal_leaf),
    }
  }

  /// Point that stands for a leaf in cost and validity checks.
  pub fn position(&self, id: NodeId, node: &NavNode) -> DVec3 {
    if id == self.ends.start_leaf {
      self.ends.start
    } else if id == self.ends.goal_leaf {
      self.ends.goal
    } else {
      self.volume.config().cell_center(&node.cell)
    }
  }

  fn size_factor(&self, node: &NavNode) -> f64 {
    self.settings.size_factor(node.cell.depth, self.volume.max_depth())
  }

  fn heuristic(&self, pos: DVec3, node: &NavNode) -> f64 {
    pos.distance(self.ends.goal) * self.settings.heuristic_weight * self.size_factor(node)
  }

  fn is_endpoint(&self, id: NodeId) -> bool {
    id == self.ends.start_leaf || id == self.ends.goal_leaf
  }

  fn endpoint_center(&self, id: NodeId) -> Option<DVec3> {
    if id == self.ends.start_leaf {
      self.start_center
    } else if id == self.ends.goal_leaf {
      self.goal_center
    } else {
      None
    }
  }

  /// Check the move `from -> to` along a link and return its length.
  ///
  /// Endpoint leaves skip the clearance test, and edges touching an endpoint
  /// are swept with a zero radius and may detour through the endpoint leaf
  /// center. A face link between two leaf centers stays inside the two
  /// leaves, so it needs no sweep at zero radius.
  fn edge_length(
    &mut self,
    (from, from_pos): (NodeId, DVec3),
    (to, to_pos): (NodeId, DVec3),
    kind: AdjacencyKind,
  ) -> Result<f64, EdgeReject> {
    if !self.is_endpoint(to) && !self.clearance.passable(to) {
      return Err(EdgeReject::Clearance);
    }
    if self.is_endpoint(from) || self.is_endpoint(to) {
      let detour = endpoint_route(
        self.volume,
        from_pos,
        self.endpoint_center(from),
        to_pos,
        self.endpoint_center(to),
        0.0,
      )
      .ok_or(EdgeReject::Segment)?;
      return Ok(route_length(from_pos, &detour, to_pos));
    }
    let straight = kind == AdjacencyKind::Face && self.radius == 0.0;
    if straight || self.volume.segment_clear(from_pos, to_pos, self.radius) {
      Ok(from_pos.distance(to_pos))
    } else {
      Err(EdgeReject::Segment)
    }
  }

  /// Run the search to completion, a cap, or cancellation.
  pub fn run(mut self, cancel: &CancelToken) -> NavResult<SearchOutcome> {
    let mut stats = SearchStats::default();
    if cancel.is_cancelled() {
      return Err(NavError::Cancelled);
    }

    let start = self.ends.start_leaf;
    let goal = self.ends.goal_leaf;
    let mut open = BinaryHeap::new();
    let mut g_score: HashMap<NodeId, f64> = HashMap::from([(start, 0.0)]);
    let mut came_from: HashMap<NodeId, NodeId> = HashMap::new();
    let mut closed: HashSet<NodeId> = HashSet::new();

    let Some(start_node) = self.volume.node(start) else {
      tracing::warn!(?start, "start leaf missing from snapshot");
      return Err(NavError::NoPath {
        expansions: 0,
        expansion_cap_hit: false,
      });
    };
    let h = self.heuristic(self.ends.start, start_node);
    open.push(OpenEntry { f: h, h, id: start });

    while let Some(entry) = open.pop() {
      if !closed.insert(entry.id) {
        continue;
      }
      if entry.id == goal {
        return Ok(SearchOutcome {
          leaves: reconstruct(&came_from, start, goal),
          stats,
        });
      }
      if cancel.is_cancelled() {
        return Err(NavError::Cancelled);
      }
      if !self.settings.can_expand(stats.expansions) {
        stats.expansion_cap_hit = true;
        break;
      }
      stats.expansions += 1;

      let Some(node) = self.volume.node(entry.id) else {
        tracing::warn!(node = ?entry.id, "open node missing from snapshot");
        continue;
      };
      let from_pos = self.position(entry.id, node);
      let g_here = g_score.get(&entry.id).copied().unwrap_or(f64::INFINITY);

      for link in node.links.iter() {
        if closed.contains(&link.node) || !self.filter.allows(link.kind) {
          continue;
        }
        let Some(target) = self.volume.node(link.node) else {
          tracing::warn!(from = ?entry.id, to = ?link.node, "link to missing node skipped");
          continue;
        };
        let to_pos = self.position(link.node, target);
        let length = match self.edge_length((entry.id, from_pos), (link.node, to_pos), link.kind) {
          Ok(length) => length,
          Err(EdgeReject::Clearance) => {
            stats.clearance_rejections += 1;
            continue;
          }
          Err(EdgeReject::Segment) => continue,
        };
        let step = self.settings.unit_cost.unwrap_or(length) * self.size_factor(target);
        let tentative = g_here + step;
        if tentative < g_score.get(&link.node).copied().unwrap_or(f64::INFINITY) {
          g_score.insert(link.node, tentative);
          came_from.insert(link.node, entry.id);
          let h = self.heuristic(to_pos, target);
          open.push(OpenEntry {
            f: tentative + h,
            h,
            id: link.node,
          });
        }
      }
    }

    if stats.expansion_cap_hit {
      tracing::warn!(expansions = stats.expansions, "search hit the expansion cap");
    } else {
      tracing::trace!(expansions = stats.expansions, "open set exhausted");
    }
    Err(NavError::NoPath {
      expansions: stats.expansions,
      expansion_cap_hit: stats.expansion_cap_hit,
    })
  }
}

enum EdgeReject {
  Clearance,
  Segment,
}

fn reconstruct(came_from: &HashMap<NodeId, NodeId>, start: NodeId, goal: NodeId) -> Vec<NodeId> {
  let mut leaves = vec![goal];
  let mut current = goal;
  while current != start {
    match came_from.get(&current) {
      Some(&prev) => {
        leaves.push(prev);
        current = prev;
      }
      None => break,
    }
  }
  leaves.reverse();
  leaves
}

#[cfg(test)]
#[path = "astar_test.rs"]
mod astar_test;
