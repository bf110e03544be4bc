//! Adjacency linker: neighbor links between Free leaves across depths.
//!
//! For every Free leaf the linker probes the same-size cells around it. Each
//! probe walks up the parent chain until an ancestor contains the probed cell,
//! then descends toward it:
//!
//! ```text
//!   coarser or equal leaf holds the probed cell  -> one link to that leaf
//!   probed cell is Mixed                         -> links to every finer Free
//!                                                   leaf inside it that touches
//!                                                   the probing leaf
//! ```
//!
//! The adjacency kind is decided from the integer spans of the two cells, not
//! from the probe direction, so both sides of a link always agree on it.

use rayon::prelude::*;

use super::arena::{LinkList, NeighborLink, NodeArena, NodeId};
use super::config::Connectivity;
use super::{CellKey, NavConfig};

/// How two touching cells meet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AdjacencyKind {
  /// Shared face area.
  Face,
  /// Shared edge segment only.
  Edge,
  /// Shared corner point only.
  Corner,
}

impl AdjacencyKind {
  /// Number of axes on which the cells touch with zero gap.
  #[inline]
  pub fn touching_axes(&self) -> u32 {
    match self {
      AdjacencyKind::Face => 1,
      AdjacencyKind::Edge => 2,
      AdjacencyKind::Corner => 3,
    }
  }
}

/// Geometric adjacency of two cells, or None if they do not touch.
///
/// Cells that overlap (including a cell and its own descendant) never touch.
pub fn touch_kind(a: &CellKey, b: &CellKey) -> Option<AdjacencyKind> {
  let fine = a.depth.max(b.depth);
  let sa = a.span_at(fine);
  let sb = b.span_at(fine);

  let mut touching = 0;
  for axis in 0..3 {
    let (alo, ahi) = sa[axis];
    let (blo, bhi) = sb[axis];
    if ahi == blo || bhi == alo {
      touching += 1;
    } else if alo < bhi && blo < ahi {
      // positive-length overlap on this axis
    } else {
      return None;
    }
  }

  match touching {
    1 => Some(AdjacencyKind::Face),
    2 => Some(AdjacencyKind::Edge),
    3 => Some(AdjacencyKind::Corner),
    _ => None,
  }
}

/// True when the closed spans of two cells meet or overlap.
fn spans_meet(a: &CellKey, b: &CellKey) -> bool {
  let fine = a.depth.max(b.depth);
  let sa = a.span_at(fine);
  let sb = b.span_at(fine);
  (0..3).all(|axis| sa[axis].0 <= sb[axis].1 && sb[axis].0 <= sa[axis].1)
}

#[inline]
fn allowed(connectivity: Connectivity, kind: AdjacencyKind) -> bool {
  kind.touching_axes() <= connectivity.max_touching_axes()
}

fn push_unique(links: &mut LinkList, link: NeighborLink) {
  if links.iter().all(|l| l.node != link.node) {
    links.push(link);
  }
}

/// Compute the links of a single Free leaf against the current arena.
///
/// Read-only; returns an empty list for anything that is not a Free leaf.
pub fn compute_links(arena: &NodeArena, config: &NavConfig, leaf_id: NodeId) -> LinkList {
  let mut links = LinkList::new();
  let Some(leaf) = arena.get(leaf_id) else {
    return links;
  };
  if !leaf.is_free_leaf() {
    return links;
  }

  for (dx, dy, dz) in config.connectivity.directions() {
    let Some(target) = leaf.cell.offset(dx, dy, dz) else {
      continue;
    };

    // Walk up until an ancestor contains the probed cell.
    let mut ancestor = leaf.parent;
    let start = loop {
      let Some(id) = ancestor else {
        break None;
      };
      let Some(node) = arena.get(id) else {
        break None;
      };
      if node.cell.contains(&target) {
        break Some(id);
      }
      ancestor = node.parent;
    };
    let Some(mut current) = start else {
      continue;
    };

    // Descend toward the probed cell.
    loop {
      let Some(node) = arena.get(current) else {
        break;
      };
      match node.children {
        None => {
          if node.is_free_leaf() {
            if let Some(kind) = touch_kind(&leaf.cell, &node.cell) {
              if allowed(config.connectivity, kind) {
                push_unique(&mut links, NeighborLink { node: current, kind });
              }
            }
          }
          break;
        }
        Some(children) if node.cell.depth >= target.depth => {
          collect_touching(arena, config.connectivity, &leaf.cell, &children, &mut links);
          break;
        }
        Some(children) => {
          let Some(next) = target.ancestor_at(node.cell.depth + 1) else {
            break;
          };
          current = children[next.octant_in_parent() as usize];
        }
      }
    }
  }

  links
}

/// Collect every Free leaf under `roots` that touches `cell`.
fn collect_touching(
  arena: &NodeArena,
  connectivity: Connectivity,
  cell: &CellKey,
  roots: &[NodeId; 8],
  links: &mut LinkList,
) {
  let mut stack: Vec<NodeId> = roots.to_vec();
  while let Some(id) = stack.pop() {
    let Some(node) = arena.get(id) else {
      continue;
    };
    if !spans_meet(cell, &node.cell) {
      continue;
    }
    match node.children {
      Some(children) => stack.extend_from_slice(&children),
      None if node.is_free_leaf() => {
        if let Some(kind) = touch_kind(cell, &node.cell) {
          if allowed(connectivity, kind) {
            push_unique(links, NeighborLink { node: id, kind });
          }
        }
      }
      None => {}
    }
  }
}

/// Link every Free leaf in the arena. Links are computed in parallel, then written.
#[tracing::instrument(skip_all, name = "adjacency::link_all")]
pub fn link_all(arena: &mut NodeArena, config: &NavConfig) -> usize {
  let free_leaves: Vec<NodeId> = arena
    .iter()
    .filter(|(_, node)| node.is_free_leaf())
    .map(|(id, _)| id)
    .collect();

  let computed: Vec<(NodeId, LinkList)> = {
    let arena_ref: &NodeArena = arena;
    free_leaves
      .par_iter()
      .map(|&id| (id, compute_links(arena_ref, config, id)))
      .collect()
  };

  let mut total = 0;
  for (id, links) in computed {
    total += links.len();
    if let Some(node) = arena.get_mut(id) {
      node.links = links;
    }
  }
  tracing::debug!(leaves = free_leaves.len(), links = total, "linked free leaves");
  total
}

/// Incrementally repair links after a region rebuild.
///
/// `removed` holds leaves that stopped being Free leaves, with the links they
/// had. `dirty` holds leaves that are Free now and need fresh links.
/// Returns the number of links written for dirty leaves.
pub fn relink(
  arena: &mut NodeArena,
  config: &NavConfig,
  removed: &[(NodeId, LinkList)],
  dirty: &[NodeId],
) -> usize {
  for (old, old_links) in removed {
    for link in old_links {
      if let Some(neighbor) = arena.get_mut(link.node) {
        neighbor.links.retain(|l| l.node != *old);
      }
    }
  }

  let computed: Vec<(NodeId, LinkList)> = dirty
    .iter()
    .map(|&id| (id, compute_links(arena, config, id)))
    .collect();

  let mut total = 0;
  for (id, links) in computed {
    total += links.len();
    for link in &links {
      if let Some(neighbor) = arena.get_mut(link.node) {
        push_unique(
          &mut neighbor.links,
          NeighborLink {
            node: id,
            kind: link.kind,
          },
        );
      }
    }
    if let Some(node) = arena.get_mut(id) {
      node.links = links;
    }
  }
  total
}

#[cfg(test)]
#[path = "adjacency_test.rs"]
mod adjacency_test;
