//! End-to-end scenarios: build, plan, update and re-plan.

use std::sync::Arc;

use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::{BoxField, EmptyWorld};
use crate::octree::{DAabb3, NavVolume, Occupancy};
use crate::planner::{plan_path, CancelToken, NavPath, PathRequest, PathStatus, PlannerSettings};
use crate::service::{QueryPriority, QueryService, ServiceSettings};
use crate::smoother::{path_length, string_pull};
use crate::test_utils::{
  assert_links_symmetric, assert_tree_invariants, build, cube_config, field, leaf_occupancy,
  link_set, wall_x,
};
use crate::update::UpdateManager;
use crate::{NavError, PathResult};

fn init_tracing() {
  let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Non-overlapping-ish clutter: random boxes on a half-unit grid.
fn random_field(seed: u64, size: f64, count: usize) -> BoxField {
  let mut rng = StdRng::seed_from_u64(seed);
  let boxes: Vec<DAabb3> = (0..count)
    .map(|_| {
      let min = DVec3::new(
        rng.random_range(0..(size as i32 - 4)) as f64,
        rng.random_range(0..(size as i32 - 4)) as f64,
        rng.random_range(0..(size as i32 - 4)) as f64,
      );
      let extent = DVec3::new(
        rng.random_range(1..=8) as f64 * 0.5,
        rng.random_range(1..=8) as f64 * 0.5,
        rng.random_range(1..=8) as f64 * 0.5,
      );
      DAabb3::new(min, min + extent)
    })
    .collect();
  field(boxes)
}

fn random_point(rng: &mut StdRng, size: f64) -> DVec3 {
  DVec3::new(
    rng.random_range(0.0..size),
    rng.random_range(0.0..size),
    rng.random_range(0.0..size),
  )
}

fn plan(volume: &NavVolume, request: &PathRequest) -> Result<NavPath, NavError> {
  plan_path(volume, request, &PlannerSettings::DEFAULT, &CancelToken::new())
}

/// No waypoint segment enters a Blocked leaf, checked leaf by leaf.
fn assert_path_valid(volume: &NavVolume, path: &NavPath) {
  let blocked: Vec<DAabb3> = volume
    .leaves()
    .filter(|(_, n)| n.occupancy == Occupancy::Blocked)
    .map(|(id, _)| volume.node_bounds(id).unwrap())
    .collect();
  for w in path.waypoints.windows(2) {
    for b in &blocked {
      assert!(
        !b.segment_hits_interior(w[0], w[1]),
        "segment {:?} -> {:?} crosses blocked {:?}",
        w[0],
        w[1],
        b
      );
    }
  }
}

// =========================================================================
// Batch 1: Reference scenarios
// =========================================================================

/// An empty 8-unit volume at depth 2 gives a single straight segment.
#[test]
fn test_empty_volume_direct_path() {
  init_tracing();
  let volume = build(&cube_config(8.0, 2), &EmptyWorld);
  let start = DVec3::ZERO;
  let goal = DVec3::splat(7.0);
  let path = plan(&volume, &PathRequest::new(start, goal)).unwrap();
  assert_eq!(path.waypoints, vec![start, goal]);
}

/// A wall with no gap separates start and goal.
#[test]
fn test_sealed_wall_is_no_path() {
  init_tracing();
  let volume = build(&cube_config(8.0, 3), &field([wall_x(8.0, 4.0, 5.0)]));
  let result = PathResult::from_outcome(
    plan(&volume, &PathRequest::new(DVec3::new(1.0, 1.0, 1.0), DVec3::new(7.0, 7.0, 7.0))),
    0,
  );
  assert_eq!(result.status, PathStatus::NoPath);
  assert!(result.waypoints().is_empty());
}

/// After notify, a re-query sees the new obstacle. A query holding the old
/// snapshot still plans on the old topology.
#[test]
fn test_notify_reroutes_and_inflight_unaffected() {
  init_tracing();
  let geometry = Arc::new(BoxField::new());
  let manager = UpdateManager::build(&cube_config(32.0, 5), geometry.clone()).unwrap();
  let request = PathRequest::new(DVec3::new(2.0, 16.0, 16.0), DVec3::new(30.0, 16.0, 16.0));

  let in_flight = manager.snapshot();
  let before = plan(&in_flight, &request).unwrap();
  assert_eq!(before.waypoints.len(), 2, "open volume, straight line");

  let block = DAabb3::new(DVec3::new(14.0, 10.0, 10.0), DVec3::new(18.0, 22.0, 22.0));
  geometry.insert(block);
  manager.notify(block).unwrap();
  assert!(manager.is_path_stale(&before));

  let after_snapshot = manager.snapshot();
  let after = plan(&after_snapshot, &request).unwrap();
  assert_eq!(after.generation, 2);
  assert!(after.waypoints.len() > 2, "must bend around the block");
  assert!(after_snapshot.segment_clear(after.waypoints[0], after.waypoints[1], 0.0));
  assert_path_valid(&after_snapshot, &after);

  // The old snapshot answers as if nothing happened.
  let replay = std::thread::spawn(move || plan(&in_flight, &request).unwrap())
    .join()
    .unwrap();
  assert_eq!(replay.waypoints, before.waypoints);
  assert_eq!(replay.generation, 1);
}

// =========================================================================
// Batch 2: Properties over random clutter
// =========================================================================

/// Same geometry and config, same classifications and links.
#[test]
fn test_build_is_deterministic() {
  let config = cube_config(32.0, 5);
  let a = build(&config, &random_field(7, 32.0, 40));
  let b = build(&config, &random_field(7, 32.0, 40));
  assert_eq!(leaf_occupancy(&a), leaf_occupancy(&b));
  assert_eq!(link_set(&a), link_set(&b));
  assert_tree_invariants(&a);
  assert_links_symmetric(&a);
}

/// Every Success stays out of Blocked leaves, is no longer than its raw
/// path, and survives a second smoothing pass unchanged.
#[test]
fn test_random_paths_are_valid() {
  init_tracing();
  let size = 32.0;
  let volume = build(&cube_config(size, 5), &random_field(11, size, 60));
  let mut rng = StdRng::seed_from_u64(99);
  let mut successes = 0;

  for _ in 0..60 {
    let request = PathRequest::new(random_point(&mut rng, size), random_point(&mut rng, size));
    let path = match plan(&volume, &request) {
      Ok(path) => path,
      Err(NavError::InvalidEndpoint { .. } | NavError::NoPath { .. }) => continue,
      Err(other) => panic!("unexpected error {other:?}"),
    };
    successes += 1;

    assert_eq!(path.waypoints.first(), Some(&request.start));
    assert_eq!(path.waypoints.last(), Some(&request.goal));
    assert!(path.waypoints.len() <= path.raw_points.len());
    assert!(path_length(&path.waypoints) <= path_length(&path.raw_points) + 1e-9);
    assert_path_valid(&volume, &path);

    let again = string_pull(&path.waypoints, |a, b| volume.segment_clear(a, b, 0.0));
    assert_eq!(again, path.waypoints, "smoothing is idempotent");
  }
  assert!(successes > 10, "only {successes} successful queries");
}

/// Paths for an agent with a radius keep that clearance away from the endpoints.
#[test]
fn test_radius_paths_keep_clearance() {
  let size = 32.0;
  let volume = build(&cube_config(size, 5), &random_field(5, size, 30));
  let mut rng = StdRng::seed_from_u64(3);
  let radius = 0.4;

  for _ in 0..30 {
    let request =
      PathRequest::new(random_point(&mut rng, size), random_point(&mut rng, size)).with_radius(radius);
    let Ok(path) = plan(&volume, &request) else {
      continue;
    };
    assert_eq!(path.agent_radius, radius);
    let n = path.waypoints.len();
    for (i, w) in path.waypoints.windows(2).enumerate() {
      if i == 0 || i + 2 == n {
        continue;
      }
      assert!(volume.segment_clear(w[0], w[1], radius), "segment {i} lacks clearance");
    }
  }
}

// =========================================================================
// Batch 3: Service under updates
// =========================================================================

/// Queries and updates interleave; every query completes on some published generation.
#[test]
fn test_queries_during_updates() {
  init_tracing();
  let geometry = Arc::new(BoxField::new());
  let manager = Arc::new(UpdateManager::build(&cube_config(32.0, 5), geometry.clone()).unwrap());
  let service = QueryService::new(manager.clone(), PlannerSettings::DEFAULT, ServiceSettings::DEFAULT).unwrap();
  let mut rng = StdRng::seed_from_u64(17);

  let mut tickets = Vec::new();
  for round in 0..8 {
    for _ in 0..8 {
      let request = PathRequest::new(random_point(&mut rng, 32.0), random_point(&mut rng, 32.0));
      tickets.push(service.submit(request, QueryPriority::Normal));
    }
    let x = 2.0 + round as f64 * 3.5;
    let post = DAabb3::new(DVec3::new(x, 0.0, 10.0), DVec3::new(x + 1.0, 32.0, 11.0));
    geometry.insert(post);
    manager.notify(post).unwrap();
  }

  let live = manager.generation();
  assert_eq!(live, 9);
  for ticket in &tickets {
    let result = ticket.wait();
    assert_ne!(result.status, PathStatus::Cancelled);
    if let Some(path) = &result.path {
      assert!(path.generation >= 1 && path.generation <= live);
    }
  }
  let load = service.load();
  assert_eq!(load.completed + load.failed, tickets.len() as u64);
}
