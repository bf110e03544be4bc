//! Octree builder: recursive classification and subdivision.
//!
//! Classification of sibling octants is independent, so the top levels of the
//! tree are classified on the rayon pool. The classified tree is then flattened
//! into the arena in a fixed order, which keeps node ids deterministic no
//! matter how the parallel work was scheduled.

use rayon::prelude::*;
use web_time::Instant;

use super::adjacency::link_all;
use super::arena::{NavNode, NodeArena, NodeId};
use super::classify::{classify_cell, Occupancy};
use super::volume::{BuildStats, NavVolume, VolumeId};
use super::{CellKey, NavConfig};
use crate::error::NavResult;
use crate::geometry::CollisionQuery;

/// Classified subtree, before it is given arena slots.
#[derive(Debug)]
pub struct ClassifiedCell {
  pub occupancy: Occupancy,
  /// Exactly 8 entries in Morton order when Mixed.
  pub children: Option<Vec<ClassifiedCell>>,
}

impl ClassifiedCell {
  /// Total number of cells in this subtree.
  pub fn node_count(&self) -> usize {
    1 + self
      .children
      .as_ref()
      .map(|c| c.iter().map(ClassifiedCell::node_count).sum())
      .unwrap_or(0)
  }
}

/// Classify `cell` and, if Mixed, all of its descendants.
pub fn classify_subtree<G: CollisionQuery + ?Sized>(
  config: &NavConfig,
  geometry: &G,
  cell: CellKey,
) -> NavResult<ClassifiedCell> {
  let occupancy = classify_cell(config, geometry, cell)?;
  if occupancy != Occupancy::Mixed {
    return Ok(ClassifiedCell {
      occupancy,
      children: None,
    });
  }
  let children = classify_children(config, geometry, cell)?;
  Ok(ClassifiedCell {
    occupancy,
    children: Some(children),
  })
}

/// Classify the 8 children of a Mixed cell.
pub fn classify_children<G: CollisionQuery + ?Sized>(
  config: &NavConfig,
  geometry: &G,
  cell: CellKey,
) -> NavResult<Vec<ClassifiedCell>> {
  if cell.depth < config.parallel_depth {
    (0..8u8)
      .into_par_iter()
      .map(|octant| classify_subtree(config, geometry, cell.child(octant)))
      .collect()
  } else {
    (0..8u8)
      .map(|octant| classify_subtree(config, geometry, cell.child(octant)))
      .collect()
  }
}

/// Give arena slots to the children of `parent_id` and everything below them.
///
/// The 8 children of a node always occupy consecutive ids. Each family is
/// placed before any grandchildren are. Returns ids of new Free leaves.
pub fn attach_children(
  arena: &mut NodeArena,
  parent_id: NodeId,
  parent_cell: CellKey,
  children: &[ClassifiedCell],
  new_free_leaves: &mut Vec<NodeId>,
) {
  debug_assert_eq!(children.len(), 8, "Mixed cells have exactly 8 children");

  let mut ids = [parent_id; 8];
  for (octant, child) in children.iter().enumerate() {
    let cell = parent_cell.child(octant as u8);
    ids[octant] = arena.push(NavNode::new(cell, child.occupancy, Some(parent_id)));
    if child.children.is_none() && child.occupancy == Occupancy::Free {
      new_free_leaves.push(ids[octant]);
    }
  }
  if let Some(parent) = arena.get_mut(parent_id) {
    parent.children = Some(ids);
  }

  for (octant, child) in children.iter().enumerate() {
    if let Some(grandchildren) = &child.children {
      attach_children(
        arena,
        ids[octant],
        parent_cell.child(octant as u8),
        grandchildren,
        new_free_leaves,
      );
    }
  }
}

/// Build a complete volume from geometry.
#[tracing::instrument(skip_all, name = "octree::build")]
pub fn build_volume<G: CollisionQuery + ?Sized>(
  config: &NavConfig,
  geometry: &G,
  volume_id: VolumeId,
  generation: u64,
) -> NavResult<NavVolume> {
  config.validate()?;
  let started = Instant::now();

  let classified = {
    let _span = tracing::info_span!("classify").entered();
    classify_subtree(config, geometry, CellKey::ROOT)?
  };

  let mut arena = NodeArena::new();
  let root = arena.push(NavNode::new(CellKey::ROOT, classified.occupancy, None));
  let mut free_leaves = Vec::new();
  if let Some(children) = &classified.children {
    attach_children(&mut arena, root, CellKey::ROOT, children, &mut free_leaves);
  } else if classified.occupancy == Occupancy::Free {
    free_leaves.push(root);
  }

  let links = {
    let _span = tracing::info_span!("link").entered();
    link_all(&mut arena, config)
  };

  let stats = BuildStats::from_arena(&arena, links, started.elapsed().as_micros() as u64);
  tracing::debug!(
    nodes = stats.nodes,
    free_leaves = stats.free_leaves,
    blocked_leaves = stats.blocked_leaves,
    links = stats.links,
    elapsed_us = stats.elapsed_us,
    "volume built"
  );

  Ok(NavVolume::from_parts(config.clone(), volume_id, generation, arena, root, stats))
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod builder_test;
