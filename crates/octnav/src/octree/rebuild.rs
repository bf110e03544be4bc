//! Region rebuild: re-classify only the cells a geometry change can affect.
//!
//! Starting at the root, every node whose bounds overlap a changed region is
//! classified again:
//!
//! ```text
//!   was Mixed, still Mixed    keep id, recurse into overlapping children
//!   was Mixed, now uniform    retire the subtree, node becomes a leaf
//!   was leaf,  now Mixed      build a fresh subtree under the node
//!   was leaf,  new occupancy  update in place
//! ```
//!
//! Occupancy ends up identical to a from-scratch build of the same geometry.
//! Nodes outside every region keep their ids and, unless a neighbor link
//! changes, keep sharing their arena page with the previous generation.

use web_time::Instant;

use super::adjacency::relink;
use super::arena::{LinkList, NodeArena, NodeId};
use super::builder::{attach_children, classify_children};
use super::classify::{classify_cell, Occupancy};
use super::volume::{BuildStats, NavVolume};
use super::{DAabb3, NavConfig};
use crate::error::NavResult;
use crate::geometry::CollisionQuery;

/// Counters from one region rebuild.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RebuildStats {
  /// Nodes classified again.
  pub reclassified: usize,
  /// Nodes removed from the arena.
  pub retired: usize,
  /// Nodes added to the arena.
  pub created: usize,
  /// Leaves whose links were recomputed.
  pub relinked_leaves: usize,
}

struct RebuildCtx<'a, G: ?Sized> {
  config: &'a NavConfig,
  geometry: &'a G,
  regions: &'a [DAabb3],
  removed: Vec<(NodeId, LinkList)>,
  dirty: Vec<NodeId>,
  stats: RebuildStats,
}

impl<G: CollisionQuery + ?Sized> RebuildCtx<'_, G> {
  fn touches(&self, bounds: &DAabb3) -> bool {
    self.regions.iter().any(|r| r.overlaps(bounds))
  }

  fn refresh(&mut self, arena: &mut NodeArena, id: NodeId) -> NavResult<()> {
    let Some(node) = arena.get(id) else {
      return Ok(());
    };
    let cell = node.cell;
    let old_occupancy = node.occupancy;
    let old_children = node.children;
    if !self.touches(&self.config.cell_bounds(&cell)) {
      return Ok(());
    }

    let occupancy = classify_cell(self.config, self.geometry, cell)?;
    self.stats.reclassified += 1;

    match (old_children, occupancy) {
      (Some(children), Occupancy::Mixed) => {
        for child in children {
          self.refresh(arena, child)?;
        }
      }
      (Some(children), uniform) => {
        for child in children {
          self.retire_subtree(arena, child);
        }
        if let Some(node) = arena.get_mut(id) {
          node.children = None;
          node.occupancy = uniform;
        }
        if uniform == Occupancy::Free {
          self.dirty.push(id);
        }
      }
      (None, Occupancy::Mixed) => {
        self.unlink_leaf(arena, id, old_occupancy);
        let classified = classify_children(self.config, self.geometry, cell)?;
        if let Some(node) = arena.get_mut(id) {
          node.occupancy = Occupancy::Mixed;
        }
        let before = arena.allocated();
        attach_children(arena, id, cell, &classified, &mut self.dirty);
        self.stats.created += arena.allocated() - before;
      }
      (None, occupancy) if occupancy == old_occupancy => {}
      (None, occupancy) => {
        self.unlink_leaf(arena, id, old_occupancy);
        if let Some(node) = arena.get_mut(id) {
          node.occupancy = occupancy;
        }
        if occupancy == Occupancy::Free {
          self.dirty.push(id);
        }
      }
    }
    Ok(())
  }

  /// Drop a Free leaf's links, remembering them so neighbors can be repaired.
  fn unlink_leaf(&mut self, arena: &mut NodeArena, id: NodeId, occupancy: Occupancy) {
    if occupancy != Occupancy::Free {
      return;
    }
    if let Some(node) = arena.get_mut(id) {
      let links = std::mem::take(&mut node.links);
      self.removed.push((id, links));
    }
  }

  fn retire_subtree(&mut self, arena: &mut NodeArena, id: NodeId) {
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
      let Some(node) = arena.retire(current) else {
        continue;
      };
      self.stats.retired += 1;
      if let Some(children) = node.children {
        stack.extend_from_slice(&children);
      } else if node.occupancy == Occupancy::Free {
        self.removed.push((current, node.links));
      }
    }
  }
}

impl NavVolume {
  /// Produce the next generation with `regions` re-classified.
  ///
  /// `regions` must already be clipped to the volume bounds. On error the
  /// receiver is untouched and remains valid.
  #[tracing::instrument(skip_all, name = "octree::rebuild_regions")]
  pub fn rebuilt<G: CollisionQuery + ?Sized>(
    &self,
    geometry: &G,
    regions: &[DAabb3],
    generation: u64,
  ) -> NavResult<(NavVolume, RebuildStats)> {
    let started = Instant::now();
    let config = self.config();
    let mut arena = self.arena().clone();

    let mut ctx = RebuildCtx {
      config,
      geometry,
      regions,
      removed: Vec::new(),
      dirty: Vec::new(),
      stats: RebuildStats::default(),
    };

    {
      let _span = tracing::info_span!("reclassify").entered();
      ctx.refresh(&mut arena, self.root())?;
    }

    // Dirty ids that were retired later in the same pass are skipped by relink.
    ctx.dirty.retain(|id| arena.get(*id).is_some_and(|n| n.is_free_leaf()));
    ctx.stats.relinked_leaves = ctx.dirty.len();
    {
      let _span = tracing::info_span!("relink").entered();
      relink(&mut arena, config, &ctx.removed, &ctx.dirty);
    }

    let links = arena.iter().map(|(_, n)| n.links.len()).sum();
    let stats = BuildStats::from_arena(&arena, links, started.elapsed().as_micros() as u64);
    tracing::debug!(
      generation,
      reclassified = ctx.stats.reclassified,
      retired = ctx.stats.retired,
      created = ctx.stats.created,
      relinked = ctx.stats.relinked_leaves,
      "regions rebuilt"
    );

    Ok((self.with_arena(generation, arena, stats), ctx.stats))
  }
}

#[cfg(test)]
#[path = "rebuild_test.rs"]
mod rebuild_test;
