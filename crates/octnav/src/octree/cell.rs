//! CellKey - immutable value type naming one cell of the octree grid.
//!
//! Cells are identified by their integer grid coordinates at their own depth.
//! Depth 0 = the whole volume, higher depth = finer.

/// Octant offsets in Morton order: bit 0 = +X, bit 1 = +Y, bit 2 = +Z.
pub const OCTANT_OFFSETS: [(u32, u32, u32); 8] = [
  (0, 0, 0),
  (1, 0, 0),
  (0, 1, 0),
  (1, 1, 0),
  (0, 0, 1),
  (1, 0, 1),
  (0, 1, 1),
  (1, 1, 1),
];

/// Octree cell - immutable value type.
///
/// Grid coordinates are at the cell's own depth, so at depth `d` every axis
/// ranges over `0..2^d`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct CellKey {
  /// Grid X position at this cell's depth
  pub x: u32,
  /// Grid Y position at this cell's depth
  pub y: u32,
  /// Grid Z position at this cell's depth
  pub z: u32,
  /// Subdivision depth (0 = root)
  pub depth: u8,
}

impl CellKey {
  /// The root cell covering the whole volume.
  pub const ROOT: Self = Self {
    x: 0,
    y: 0,
    z: 0,
    depth: 0,
  };

  /// Create a new cell key.
  pub fn new(x: u32, y: u32, z: u32, depth: u8) -> Self {
    Self { x, y, z, depth }
  }

  /// Number of cells along one axis at this depth.
  #[inline]
  pub fn grid_extent(depth: u8) -> u32 {
    1u32 << depth
  }

  /// Get child cell (finer detail: depth + 1).
  ///
  /// Octant: 0-7 where bits represent +X, +Y, +Z offsets.
  pub fn child(&self, octant: u8) -> Self {
    let (cx, cy, cz) = OCTANT_OFFSETS[(octant & 7) as usize];
    Self {
      x: self.x * 2 + cx,
      y: self.y * 2 + cy,
      z: self.z * 2 + cz,
      depth: self.depth + 1,
    }
  }

  /// Get parent cell (coarser: depth - 1).
  ///
  /// Returns None for the root.
  pub fn parent(&self) -> Option<Self> {
    if self.depth == 0 {
      return None;
    }
    Some(Self {
      x: self.x / 2,
      y: self.y / 2,
      z: self.z / 2,
      depth: self.depth - 1,
    })
  }

  /// Octant index of this cell within its parent.
  #[inline]
  pub fn octant_in_parent(&self) -> u8 {
    ((self.x & 1) | ((self.y & 1) << 1) | ((self.z & 1) << 2)) as u8
  }

  /// Project this cell onto a coarser depth.
  ///
  /// Returns the ancestor cell at `depth`, or None when `depth` is finer than
  /// this cell.
  pub fn ancestor_at(&self, depth: u8) -> Option<Self> {
    if depth > self.depth {
      return None;
    }
    let shift = self.depth - depth;
    Some(Self {
      x: self.x >> shift,
      y: self.y >> shift,
      z: self.z >> shift,
      depth,
    })
  }

  /// Check whether `other` is this cell or lies inside it.
  pub fn contains(&self, other: &CellKey) -> bool {
    other.ancestor_at(self.depth) == Some(*self)
  }

  /// Same-depth cell offset by `(dx, dy, dz)`, or None when it falls outside the grid.
  pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
    let extent = Self::grid_extent(self.depth) as i64;
    let nx = self.x as i64 + dx as i64;
    let ny = self.y as i64 + dy as i64;
    let nz = self.z as i64 + dz as i64;
    if nx < 0 || ny < 0 || nz < 0 || nx >= extent || ny >= extent || nz >= extent {
      return None;
    }
    Some(Self {
      x: nx as u32,
      y: ny as u32,
      z: nz as u32,
      depth: self.depth,
    })
  }

  /// Integer span `[lo, hi)` of this cell on each axis, measured in cells of `fine_depth`.
  ///
  /// Used to compare cells of different depths exactly, without floating point.
  pub fn span_at(&self, fine_depth: u8) -> [(u64, u64); 3] {
    debug_assert!(fine_depth >= self.depth);
    let scale = 1u64 << (fine_depth - self.depth);
    [
      (self.x as u64 * scale, (self.x as u64 + 1) * scale),
      (self.y as u64 * scale, (self.y as u64 + 1) * scale),
      (self.z as u64 * scale, (self.z as u64 + 1) * scale),
    ]
  }
}

#[cfg(test)]
#[path = "cell_test.rs"]
mod cell_test;
