use glam::DVec3;

use super::*;
use crate::octree::{DAabb3, Occupancy};
use crate::test_utils::{
  assert_links_symmetric, brute_force_links, build, cube_config, field, link_set, wall_x,
};

// =========================================================================
// Batch 1: Geometric touch classification
// =========================================================================

#[test]
fn test_touch_kind_same_depth() {
  let a = CellKey::new(1, 1, 1, 2);
  assert_eq!(touch_kind(&a, &CellKey::new(2, 1, 1, 2)), Some(AdjacencyKind::Face));
  assert_eq!(touch_kind(&a, &CellKey::new(2, 2, 1, 2)), Some(AdjacencyKind::Edge));
  assert_eq!(touch_kind(&a, &CellKey::new(0, 0, 0, 2)), Some(AdjacencyKind::Corner));
  assert_eq!(touch_kind(&a, &CellKey::new(3, 1, 1, 2)), None, "one-cell gap");
  assert_eq!(touch_kind(&a, &a), None, "a cell does not touch itself");
}

/// A small cell on the face of a large one touches it by face.
#[test]
fn test_touch_kind_across_depths() {
  let big = CellKey::new(0, 0, 0, 1); // [0, 4) at depth 3 units
  let small_face = CellKey::new(4, 1, 2, 3);
  let small_edge = CellKey::new(4, 4, 2, 3);
  let small_corner = CellKey::new(4, 4, 4, 3);
  assert_eq!(touch_kind(&big, &small_face), Some(AdjacencyKind::Face));
  assert_eq!(touch_kind(&small_face, &big), Some(AdjacencyKind::Face), "order independent");
  assert_eq!(touch_kind(&big, &small_edge), Some(AdjacencyKind::Edge));
  assert_eq!(touch_kind(&big, &small_corner), Some(AdjacencyKind::Corner));
  assert_eq!(touch_kind(&big, &CellKey::new(1, 1, 1, 3)), None, "nested cells overlap");
}

// =========================================================================
// Batch 2: Linking across depths
// =========================================================================

/// A large Free leaf links to every smaller Free leaf along its face.
#[test]
fn test_large_leaf_links_to_smaller_neighbors() {
  let mut config = cube_config(8.0, 3);
  config.connectivity = Connectivity::Six;
  let speck = DAabb3::new(DVec3::splat(6.2), DVec3::splat(6.8));
  let volume = build(&config, &field([speck]));

  let big = volume.locate_leaf(DVec3::new(2.0, 6.0, 6.0)).unwrap();
  assert_eq!(volume.node(big).unwrap().cell.depth, 1, "coarse leaf");

  let fine_neighbors: Vec<_> = volume
    .node(big)
    .unwrap()
    .links
    .iter()
    .filter(|l| volume.node(l.node).unwrap().cell.depth == 2)
    .collect();
  assert_eq!(fine_neighbors.len(), 4, "four depth-2 cells share the x = 4 face");
  assert!(fine_neighbors.iter().all(|l| l.kind == AdjacencyKind::Face));
  assert_links_symmetric(&volume);
}

/// Blocked leaves never appear in links.
#[test]
fn test_links_skip_blocked() {
  let volume = build(&cube_config(8.0, 3), &field([wall_x(8.0, 3.0, 5.0)]));
  for (_, node) in volume.free_leaves() {
    for link in &node.links {
      assert_eq!(volume.node(link.node).unwrap().occupancy, Occupancy::Free);
    }
  }
  // Nothing crosses the wall.
  let left = volume.locate_leaf(DVec3::new(2.5, 4.0, 4.0)).unwrap();
  for link in &volume.node(left).unwrap().links {
    let center = volume.node_center(link.node).unwrap();
    assert!(center.x < 3.0, "link crosses the wall to {center:?}");
  }
}

// =========================================================================
// Batch 3: Agreement with exhaustive pair comparison
// =========================================================================

fn cluttered() -> crate::geometry::BoxField {
  field([
    wall_x(16.0, 7.0, 8.0),
    DAabb3::new(DVec3::new(1.0, 1.0, 1.0), DVec3::new(3.5, 2.0, 6.0)),
    DAabb3::new(DVec3::new(9.5, 10.0, 3.0), DVec3::new(14.0, 13.0, 4.0)),
    DAabb3::new(DVec3::new(12.0, 0.0, 12.0), DVec3::new(16.0, 5.0, 16.0)),
  ])
}

/// Probing finds exactly the pairs an all-pairs comparison finds.
#[test]
fn test_probe_matches_brute_force_all_connectivities() {
  for (connectivity, max_kind) in [
    (Connectivity::Six, 1),
    (Connectivity::Eighteen, 2),
    (Connectivity::TwentySix, 3),
  ] {
    let mut config = cube_config(16.0, 4);
    config.connectivity = connectivity;
    let volume = build(&config, &cluttered());
    assert_eq!(
      link_set(&volume),
      brute_force_links(&volume, max_kind),
      "{connectivity:?} linking disagrees with brute force"
    );
  }
}

/// A link from A to B implies a link from B to A of the same kind.
#[test]
fn test_links_are_symmetric() {
  let volume = build(&cube_config(16.0, 4), &cluttered());
  assert_links_symmetric(&volume);
}

/// Face-only connectivity never records edge or corner links.
#[test]
fn test_face_connectivity_filters_kinds() {
  let mut config = cube_config(16.0, 4);
  config.connectivity = Connectivity::Six;
  let volume = build(&config, &cluttered());
  for (_, node) in volume.free_leaves() {
    assert!(node.links.iter().all(|l| l.kind == AdjacencyKind::Face));
  }
}
