use super::*;

/// Children follow Morton order: bit 0 = X, bit 1 = Y, bit 2 = Z.
#[test]
fn test_child_morton_order() {
  let root = CellKey::ROOT;
  assert_eq!(root.child(0), CellKey::new(0, 0, 0, 1));
  assert_eq!(root.child(1), CellKey::new(1, 0, 0, 1));
  assert_eq!(root.child(2), CellKey::new(0, 1, 0, 1));
  assert_eq!(root.child(4), CellKey::new(0, 0, 1, 1));
  assert_eq!(root.child(7), CellKey::new(1, 1, 1, 1));
}

#[test]
fn test_child_parent_roundtrip() {
  let cell = CellKey::new(3, 5, 2, 3);
  for octant in 0..8u8 {
    let child = cell.child(octant);
    assert_eq!(child.parent(), Some(cell), "octant {octant} should map back to parent");
    assert_eq!(child.octant_in_parent(), octant);
  }
}

#[test]
fn test_root_has_no_parent() {
  assert_eq!(CellKey::ROOT.parent(), None);
}

#[test]
fn test_ancestor_and_contains() {
  let fine = CellKey::new(13, 6, 9, 4);
  let coarse = fine.ancestor_at(2).unwrap();
  assert_eq!(coarse, CellKey::new(3, 1, 2, 2));
  assert!(coarse.contains(&fine));
  assert!(!fine.contains(&coarse));
  assert!(fine.ancestor_at(5).is_none(), "cannot project to a finer depth");
}

#[test]
fn test_offset_respects_grid_extent() {
  let cell = CellKey::new(0, 3, 1, 2);
  assert_eq!(cell.offset(-1, 0, 0), None);
  assert_eq!(cell.offset(0, 1, 0), None, "y = 4 is outside a depth-2 grid");
  assert_eq!(cell.offset(1, -1, 1), Some(CellKey::new(1, 2, 2, 2)));
}

#[test]
fn test_span_at_finer_depth() {
  let cell = CellKey::new(1, 0, 2, 2);
  let span = cell.span_at(4);
  assert_eq!(span[0], (4, 8));
  assert_eq!(span[1], (0, 4));
  assert_eq!(span[2], (8, 12));
}
