//! Path planning against one immutable snapshot.
//!
//! ```text
//!   PathRequest ──► locate endpoints ──► A* over leaves ──► raw points ──► smoother ──► NavPath
//!                   (InvalidEndpoint)    (NoPath/Cancelled)
//! ```
//!
//! - [`request`]: request, result and cancellation types
//! - [`settings`]: search limits and smoothing switches
//! - [`astar`]: leaf-graph search
//! - [`clearance`]: per-query agent clearance memo

pub mod astar;
pub mod clearance;
pub mod request;
pub mod settings;

pub use request::{
  AdjacencyFilter, CancelToken, NavPath, PathRequest, PathResult, PathStatus, SearchStats,
};
pub use settings::PlannerSettings;

use glam::DVec3;
use web_time::Instant;

use crate::error::{Endpoint, NavError, NavResult};
use crate::octree::{NavVolume, NodeId};
use crate::smoother;
use astar::{Endpoints, Search};

/// Plan a path through `volume`.
///
/// Runs entirely on the caller's thread and reads only the given snapshot.
#[tracing::instrument(skip_all, name = "planner::plan_path")]
pub fn plan_path(
  volume: &NavVolume,
  request: &PathRequest,
  settings: &PlannerSettings,
  cancel: &CancelToken,
) -> NavResult<NavPath> {
  let started = Instant::now();
  settings.validate()?;
  if let Some(radius) = request.agent_radius {
    if !(radius.is_finite() && radius >= 0.0) {
      return Err(NavError::InvalidConfig(format!("agent radius must be non-negative, got {radius}")));
    }
  }
  if cancel.is_cancelled() {
    return Err(NavError::Cancelled);
  }

  let radius = request
    .agent_radius
    .unwrap_or(volume.config().default_agent_radius)
    .max(0.0);
  let start_leaf = volume.endpoint_leaf(request.start, Endpoint::Start)?;
  let goal_leaf = volume.endpoint_leaf(request.goal, Endpoint::Goal)?;

  let (leaves, mut stats) = if start_leaf == goal_leaf {
    (vec![start_leaf], SearchStats::default())
  } else {
    let ends = Endpoints {
      start: request.start,
      goal: request.goal,
      start_leaf,
      goal_leaf,
    };
    let outcome = Search::new(volume, ends, radius, request.filter, settings).run(cancel)?;
    (outcome.leaves, outcome.stats)
  };

  let raw_points = raw_points(volume, &leaves, request.start, request.goal);
  let waypoints = smoother::smooth_path(&raw_points, settings, |a, b| {
    volume.segment_clear(a, b, radius)
  });
  stats.elapsed_us = started.elapsed().as_micros() as u64;

  tracing::trace!(
    leaves = leaves.len(),
    waypoints = waypoints.len(),
    expansions = stats.expansions,
    "path found"
  );

  Ok(NavPath {
    volume: volume.id(),
    generation: volume.generation(),
    waypoints,
    raw_points,
    leaves,
    agent_radius: radius,
    stats,
  })
}

/// `[start, centers of intermediate leaves.., goal]`, plus any endpoint
/// center detours the search took on the first and last edges.
fn raw_points(volume: &NavVolume, leaves: &[NodeId], start: DVec3, goal: DVec3) -> Vec<DVec3> {
  let (Some(&first), Some(&last)) = (leaves.first(), leaves.last()) else {
    return vec![start, goal];
  };
  if first == last {
    return vec![start, goal];
  }
  let mut anchors = Vec::with_capacity(leaves.len());
  anchors.push(start);
  anchors.extend(
    leaves[1..leaves.len() - 1]
      .iter()
      .filter_map(|&id| volume.node_center(id)),
  );
  anchors.push(goal);

  let start_center = volume.node_center(first);
  let goal_center = volume.node_center(last);
  let last_edge = anchors.len() - 2;
  let mut points = Vec::with_capacity(anchors.len() + 2);
  points.push(start);
  for (i, pair) in anchors.windows(2).enumerate() {
    let (from, to) = (pair[0], pair[1]);
    if i == 0 || i == last_edge {
      let from_center = if i == 0 { start_center } else { None };
      let to_center = if i == last_edge { goal_center } else { None };
      if let Some(detour) = astar::endpoint_route(volume, from, from_center, to, to_center, 0.0) {
        points.extend(detour);
      }
    }
    points.push(to);
  }
  points
}
