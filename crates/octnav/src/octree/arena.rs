//! Paged node arena shared between generations.
//!
//! Nodes are addressed by a stable `NodeId`. Slots live in fixed-size pages
//! held behind `Arc`, so cloning an arena for the next generation copies only
//! the page table. The first write to a shared page copies that page alone;
//! every untouched page stays shared with the previous generation.
//!
//! ```text
//!   generation N        pages: [A] [B] [C] [D]
//!                               │   │   │   │
//!   generation N+1      pages: [A] [B'] [C] [D] [E]
//!                                   ▲           ▲
//!                        copied on write    appended
//! ```
//!
//! Slots are never reused. A retired node leaves an empty slot behind, so an
//! id handed out once always refers to the same logical cell.

use std::sync::Arc;

use smallvec::SmallVec;

use super::adjacency::AdjacencyKind;
use super::classify::Occupancy;
use super::CellKey;

/// Slots per arena page.
pub const PAGE_SIZE: usize = 256;

/// Stable index of a node in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
  /// Raw slot index.
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }

  #[inline]
  fn from_index(index: usize) -> Self {
    Self(index as u32)
  }

  #[inline]
  fn page(self) -> usize {
    self.index() / PAGE_SIZE
  }

  #[inline]
  fn slot(self) -> usize {
    self.index() % PAGE_SIZE
  }
}

/// Non-owning link to an adjacent Free leaf.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NeighborLink {
  pub node: NodeId,
  pub kind: AdjacencyKind,
}

/// Neighbor list. Most leaves have a handful of links.
pub type LinkList = SmallVec<[NeighborLink; 8]>;

/// One cell of the octree.
#[derive(Clone, Debug, PartialEq)]
pub struct NavNode {
  /// Grid position and depth. Bounds are derived from this and the volume config.
  pub cell: CellKey,
  /// Occupancy. Only Mixed nodes have children.
  pub occupancy: Occupancy,
  /// Back-reference to the parent; None for the root.
  pub parent: Option<NodeId>,
  /// Owned child slots in Morton order (Mixed only).
  pub children: Option<[NodeId; 8]>,
  /// Adjacent Free leaves (Free leaves only).
  pub links: LinkList,
}

impl NavNode {
  /// Create a childless, unlinked node.
  pub fn new(cell: CellKey, occupancy: Occupancy, parent: Option<NodeId>) -> Self {
    Self {
      cell,
      occupancy,
      parent,
      children: None,
      links: LinkList::new(),
    }
  }

  /// True when the node has no children.
  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_none()
  }

  /// True for leaves the planner may traverse.
  #[inline]
  pub fn is_free_leaf(&self) -> bool {
    self.children.is_none() && self.occupancy == Occupancy::Free
  }

  /// Link to `other`, if any.
  pub fn link_to(&self, other: NodeId) -> Option<&NeighborLink> {
    self.links.iter().find(|link| link.node == other)
  }
}

type Page = Vec<Option<NavNode>>;

/// Append-only paged arena with copy-on-write pages.
#[derive(Clone, Debug, Default)]
pub struct NodeArena {
  pages: Vec<Arc<Page>>,
  /// Slots handed out so far (live and retired).
  allocated: usize,
  /// Slots currently holding a node.
  live: usize,
}

impl NodeArena {
  pub fn new() -> Self {
    Self::default()
  }

  /// Look up a live node.
  #[inline]
  pub fn get(&self, id: NodeId) -> Option<&NavNode> {
    self
      .pages
      .get(id.page())
      .and_then(|page| page.get(id.slot()))
      .and_then(|slot| slot.as_ref())
  }

  /// Mutable access to a live node, copying its page if it is shared.
  pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NavNode> {
    let page = self.pages.get_mut(id.page())?;
    Arc::make_mut(page).get_mut(id.slot())?.as_mut()
  }

  /// Append a node and return its id. Ids are strictly increasing.
  pub fn push(&mut self, node: NavNode) -> NodeId {
    let id = NodeId::from_index(self.allocated);
    if id.slot() == 0 {
      self.pages.push(Arc::new(Vec::with_capacity(PAGE_SIZE)));
    }
    // The last page may still be shared with an older generation.
    if let Some(page) = self.pages.last_mut() {
      Arc::make_mut(page).push(Some(node));
    }
    self.allocated += 1;
    self.live += 1;
    id
  }

  /// Remove a node, leaving its slot permanently empty.
  pub fn retire(&mut self, id: NodeId) -> Option<NavNode> {
    let page = self.pages.get_mut(id.page())?;
    let taken = Arc::make_mut(page).get_mut(id.slot())?.take();
    if taken.is_some() {
      self.live -= 1;
    }
    taken
  }

  /// Number of live nodes.
  #[inline]
  pub fn live_count(&self) -> usize {
    self.live
  }

  /// Number of slots ever allocated, including retired ones.
  #[inline]
  pub fn allocated(&self) -> usize {
    self.allocated
  }

  /// Number of pages.
  #[inline]
  pub fn page_count(&self) -> usize {
    self.pages.len()
  }

  /// Count pages physically shared with `other`.
  pub fn shared_pages_with(&self, other: &NodeArena) -> usize {
    self
      .pages
      .iter()
      .zip(other.pages.iter())
      .filter(|(a, b)| Arc::ptr_eq(a, b))
      .count()
  }

  /// Iterate live nodes in id order.
  pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NavNode)> + '_ {
    self.pages.iter().enumerate().flat_map(|(page_idx, page)| {
      page.iter().enumerate().filter_map(move |(slot, node)| {
        node
          .as_ref()
          .map(|n| (NodeId::from_index(page_idx * PAGE_SIZE + slot), n))
      })
    })
  }
}

#[cfg(test)]
#[path = "arena_test.rs"]
mod arena_test;
