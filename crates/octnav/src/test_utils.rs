//! Test utilities: mock geometry, fixture volumes and structural checks.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DVec3;

use crate::error::GeometryError;
use crate::geometry::{BoxField, CollisionQuery};
use crate::octree::adjacency::touch_kind;
use crate::octree::{build_volume, CellKey, DAabb3, NavConfig, NavVolume, NodeId, Occupancy, VolumeId};

// =============================================================================
// Mock geometry
// =============================================================================

/// Reports the same coverage for every box.
pub struct FixedCoverage(pub f64);

impl CollisionQuery for FixedCoverage {
  fn coverage(&self, _bounds: &DAabb3) -> Result<f64, GeometryError> {
    Ok(self.0)
  }
}

/// Every query fails.
pub struct FailingGeometry;

impl CollisionQuery for FailingGeometry {
  fn coverage(&self, _bounds: &DAabb3) -> Result<f64, GeometryError> {
    Err(GeometryError::Unavailable("collision world not loaded".into()))
  }
}

/// Wraps another geometry and counts queries.
pub struct CountingGeometry<G> {
  pub inner: G,
  pub queries: AtomicUsize,
}

impl<G> CountingGeometry<G> {
  pub fn new(inner: G) -> Self {
    Self {
      inner,
      queries: AtomicUsize::new(0),
    }
  }

  pub fn count(&self) -> usize {
    self.queries.load(Ordering::Relaxed)
  }
}

impl<G: CollisionQuery> CollisionQuery for CountingGeometry<G> {
  fn coverage(&self, bounds: &DAabb3) -> Result<f64, GeometryError> {
    self.queries.fetch_add(1, Ordering::Relaxed);
    self.inner.coverage(bounds)
  }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Cube volume `[0, size]^3` at the given depth.
pub fn cube_config(size: f64, max_depth: u8) -> NavConfig {
  NavConfig::new(DAabb3::new(DVec3::ZERO, DVec3::splat(size)), max_depth)
}

/// Solid slab spanning the whole cube across Y and Z, between `x0` and `x1`.
pub fn wall_x(size: f64, x0: f64, x1: f64) -> DAabb3 {
  DAabb3::new(DVec3::new(x0, -1.0, -1.0), DVec3::new(x1, size + 1.0, size + 1.0))
}

/// X slab with a square hole spanning `[lo, hi]` in Y and Z, as four disjoint boxes.
pub fn wall_with_hole(size: f64, x0: f64, x1: f64, lo: f64, hi: f64) -> Vec<DAabb3> {
  let (min, max) = (-1.0, size + 1.0);
  vec![
    DAabb3::new(DVec3::new(x0, min, min), DVec3::new(x1, lo, max)),
    DAabb3::new(DVec3::new(x0, hi, min), DVec3::new(x1, max, max)),
    DAabb3::new(DVec3::new(x0, lo, min), DVec3::new(x1, hi, lo)),
    DAabb3::new(DVec3::new(x0, lo, hi), DVec3::new(x1, hi, max)),
  ]
}

/// Build generation 1 of a volume, panicking on failure.
pub fn build<G: CollisionQuery + ?Sized>(config: &NavConfig, geometry: &G) -> NavVolume {
  build_volume(config, geometry, VolumeId::new(), 1).expect("test volume should build")
}

/// Box field of solids.
pub fn field(boxes: impl IntoIterator<Item = DAabb3>) -> BoxField {
  BoxField::from_boxes(boxes)
}

// =============================================================================
// Structural checks
// =============================================================================

/// Every directed link as a sorted set, for equality comparisons.
pub fn link_set(volume: &NavVolume) -> BTreeSet<(NodeId, NodeId, u32)> {
  volume
    .free_leaves()
    .flat_map(|(id, node)| {
      node
        .links
        .iter()
        .map(move |l| (id, l.node, l.kind.touching_axes()))
    })
    .collect()
}

/// Links computed by comparing every pair of Free leaves.
pub fn brute_force_links(volume: &NavVolume, max_kind: u32) -> BTreeSet<(NodeId, NodeId, u32)> {
  let leaves: Vec<_> = volume.free_leaves().map(|(id, n)| (id, n.cell)).collect();
  let mut links = BTreeSet::new();
  for (a, ca) in &leaves {
    for (b, cb) in &leaves {
      if a == b {
        continue;
      }
      if let Some(kind) = touch_kind(ca, cb) {
        if kind.touching_axes() <= max_kind {
          links.insert((*a, *b, kind.touching_axes()));
        }
      }
    }
  }
  links
}

/// Panics unless every link has a reverse link of the same kind.
pub fn assert_links_symmetric(volume: &NavVolume) {
  for (id, node) in volume.free_leaves() {
    for link in &node.links {
      let other = volume
        .node(link.node)
        .unwrap_or_else(|| panic!("{id:?} links to missing node {:?}", link.node));
      assert!(other.is_free_leaf(), "{id:?} links to non-free {:?}", link.node);
      let back = other.link_to(id).map(|l| l.kind);
      assert_eq!(back, Some(link.kind), "link {id:?} -> {:?} is not symmetric", link.node);
    }
  }
}

/// Panics unless Mixed nodes have 8 children and nothing else has any.
pub fn assert_tree_invariants(volume: &NavVolume) {
  for (id, node) in volume.arena().iter() {
    match node.occupancy {
      Occupancy::Mixed => {
        let children = node
          .children
          .unwrap_or_else(|| panic!("Mixed node {id:?} has no children"));
        for child in children {
          let c = volume.node(child).expect("child must be live");
          assert_eq!(c.parent, Some(id), "child back-reference");
          assert_eq!(c.cell.parent(), Some(node.cell), "child cell geometry");
        }
      }
      _ => assert!(node.children.is_none(), "{:?} node {id:?} has children", node.occupancy),
    }
    if node.cell.depth == volume.max_depth() {
      assert_ne!(node.occupancy, Occupancy::Mixed, "Mixed at max depth");
    }
    if !node.is_free_leaf() {
      assert!(node.links.is_empty(), "only Free leaves carry links");
    }
  }
}

/// Occupancy of every leaf keyed by cell, for comparing generations.
pub fn leaf_occupancy(volume: &NavVolume) -> BTreeSet<(CellKey, bool)> {
  volume
    .leaves()
    .map(|(_, n)| (n.cell, n.occupancy == Occupancy::Free))
    .collect()
}

