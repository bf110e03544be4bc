use std::sync::atomic::{AtomicBool, Ordering};

use super::*;
use crate::error::GeometryError;
use crate::geometry::BoxField;
use crate::planner::{plan_path, CancelToken, PathRequest, PlannerSettings};
use crate::test_utils::{build, cube_config, leaf_occupancy};

/// Box field whose queries can be made to fail.
#[derive(Default)]
struct Flaky {
  field: BoxField,
  failing: AtomicBool,
}

impl CollisionQuery for Flaky {
  fn coverage(&self, bounds: &DAabb3) -> Result<f64, GeometryError> {
    if self.failing.load(Ordering::Relaxed) {
      return Err(GeometryError::Unavailable("offline".into()));
    }
    self.field.coverage(bounds)
  }
}

fn manager() -> (UpdateManager, Arc<BoxField>) {
  let geometry = Arc::new(BoxField::new());
  let manager = UpdateManager::build(&cube_config(16.0, 4), geometry.clone()).unwrap();
  (manager, geometry)
}

fn post() -> DAabb3 {
  DAabb3::new(DVec3::new(7.0, 0.0, 7.0), DVec3::new(9.0, 16.0, 9.0))
}

fn straight_path(manager: &UpdateManager) -> NavPath {
  let request = PathRequest::new(DVec3::new(1.0, 8.0, 8.0), DVec3::new(15.0, 8.0, 8.0));
  plan_path(&manager.snapshot(), &request, &PlannerSettings::DEFAULT, &CancelToken::new()).unwrap()
}

// =========================================================================
// Batch 1: Publication
// =========================================================================

#[test]
fn test_notify_publishes_next_generation() {
  let (manager, geometry) = manager();
  let before = manager.snapshot();
  geometry.insert(post());

  let report = manager.notify(post()).unwrap();
  assert_eq!(report.generation, 2);
  assert!(report.stats.created > 0);
  assert_eq!(manager.generation(), 2);

  let after = manager.snapshot();
  assert_eq!(after.id(), before.id(), "same lineage");
  assert!(after.locate_leaf(DVec3::new(8.0, 8.0, 8.0)).is_some_and(|id| !after.node(id).unwrap().is_free_leaf()));
  assert!(before.node(before.root()).unwrap().is_free_leaf(), "held snapshot is unchanged");
}

#[test]
fn test_region_outside_is_out_of_bounds() {
  let (manager, _) = manager();
  let far = DAabb3::new(DVec3::splat(100.0), DVec3::splat(101.0));
  assert_eq!(manager.notify(far), Err(NavError::OutOfBounds { region: far }));
  assert_eq!(manager.generation(), 1, "nothing published");
}

/// A region sticking out of the volume is clipped, not rejected.
#[test]
fn test_partial_region_is_clipped() {
  let (manager, geometry) = manager();
  let straddling = DAabb3::new(DVec3::new(12.0, 12.0, 12.0), DVec3::new(20.0, 20.0, 20.0));
  geometry.insert(straddling);
  let report = manager.notify(straddling).unwrap();
  assert_eq!(report.generation, 2);
  let fresh = build(manager.snapshot().config(), geometry.as_ref());
  assert_eq!(leaf_occupancy(&manager.snapshot()), leaf_occupancy(&fresh));
}

#[test]
fn test_notify_many_is_one_generation() {
  let (manager, geometry) = manager();
  let a = DAabb3::new(DVec3::splat(1.0), DVec3::splat(2.0));
  let b = DAabb3::new(DVec3::splat(12.0), DVec3::splat(13.0));
  geometry.insert(a);
  geometry.insert(b);
  let report = manager.notify_many(&[a, b]).unwrap();
  assert_eq!(report.generation, 2);
  let fresh = build(manager.snapshot().config(), geometry.as_ref());
  assert_eq!(leaf_occupancy(&manager.snapshot()), leaf_occupancy(&fresh));
}

#[test]
fn test_rebuild_all_matches_fresh_build() {
  let (manager, geometry) = manager();
  geometry.insert(post());
  let report = manager.rebuild_all().unwrap();
  assert_eq!(report.generation, 2);
  let fresh = build(manager.snapshot().config(), geometry.as_ref());
  assert_eq!(leaf_occupancy(&manager.snapshot()), leaf_occupancy(&fresh));
}

/// A failing collaborator leaves the live generation in place.
#[test]
fn test_failed_rebuild_keeps_live_generation() {
  let geometry = Arc::new(Flaky::default());
  let manager = UpdateManager::build(&cube_config(16.0, 4), geometry.clone()).unwrap();
  geometry.field.insert(post());
  geometry.failing.store(true, Ordering::Relaxed);

  assert!(matches!(manager.notify(post()), Err(NavError::BuildFailure(_))));
  assert_eq!(manager.generation(), 1);

  geometry.failing.store(false, Ordering::Relaxed);
  assert_eq!(manager.notify(post()).unwrap().generation, 2);
}

// =========================================================================
// Batch 2: Path staleness
// =========================================================================

#[test]
fn test_path_stale_after_overlapping_change() {
  let (manager, geometry) = manager();
  let path = straight_path(&manager);
  assert!(!manager.is_path_stale(&path));

  geometry.insert(post());
  manager.notify(post()).unwrap();
  assert!(manager.is_path_stale(&path));
}

#[test]
fn test_path_fresh_after_distant_change() {
  let (manager, geometry) = manager();
  let path = straight_path(&manager);
  let corner = DAabb3::new(DVec3::splat(0.0), DVec3::splat(1.0));
  geometry.insert(corner);
  manager.notify(corner).unwrap();
  assert!(!manager.is_path_stale(&path));

  let replanned = straight_path(&manager);
  assert_eq!(replanned.generation, 2);
  assert!(!manager.is_path_stale(&replanned));
}

#[test]
fn test_full_rebuild_makes_paths_stale() {
  let (manager, _) = manager();
  let path = straight_path(&manager);
  manager.rebuild_all().unwrap();
  assert!(manager.is_path_stale(&path));
}

#[test]
fn test_path_from_other_volume_is_stale() {
  let (manager, _) = manager();
  let (other, _) = self::manager();
  assert!(other.is_path_stale(&straight_path(&manager)));
}
