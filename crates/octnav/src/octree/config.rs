//! NavConfig - volume configuration and world coordinate mapping.
//!
//! Everything here is fixed at volume construction. Changing the depth or
//! bounds means building a new volume.

use glam::DVec3;
use serde::Deserialize;

use super::{CellKey, DAabb3};
use crate::error::{NavError, NavResult};

/// Deepest subdivision supported. Keeps grid coordinates well inside `u32`.
pub const MAX_SUPPORTED_DEPTH: u8 = 20;

/// Which neighbor cells the adjacency linker probes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
  /// Face neighbors only.
  Six,
  /// Face and edge neighbors.
  Eighteen,
  /// Face, edge and corner neighbors.
  #[default]
  TwentySix,
}

impl Connectivity {
  /// Maximum number of axes on which two linked cells may touch
  /// (1 = face, 2 = edge, 3 = corner).
  #[inline]
  pub fn max_touching_axes(&self) -> u32 {
    match self {
      Connectivity::Six => 1,
      Connectivity::Eighteen => 2,
      Connectivity::TwentySix => 3,
    }
  }

  /// Direction offsets probed for this connectivity, face directions first.
  pub fn directions(&self) -> impl Iterator<Item = (i32, i32, i32)> {
    let limit = self.max_touching_axes();
    let mut dirs: Vec<(i32, i32, i32)> = Vec::with_capacity(26);
    for dz in -1..=1 {
      for dy in -1..=1 {
        for dx in -1..=1 {
          let nonzero = (dx != 0) as u32 + (dy != 0) as u32 + (dz != 0) as u32;
          if nonzero > 0 && nonzero <= limit {
            dirs.push((dx, dy, dz));
          }
        }
      }
    }
    dirs.sort_by_key(|&(dx, dy, dz)| dx.abs() + dy.abs() + dz.abs());
    dirs.into_iter()
  }
}

/// What a Mixed cell at max depth becomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixedLeafPolicy {
  /// Partial occupancy is never traversable.
  #[default]
  Blocked,
  /// Best-effort mode for coarse agents: partial occupancy counts as open.
  Free,
}

/// Configuration for the navigable volume.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavConfig {
  /// World-space bounds of the navigable region.
  pub bounds: DAabb3,

  /// Deepest subdivision level. Leaf size = bounds.size / 2^max_depth.
  pub max_depth: u8,

  /// Neighbor probing pattern for the adjacency linker.
  pub connectivity: Connectivity,

  /// Coverage fraction at or above which a cell is Blocked. Must be in (0, 1].
  pub occupancy_threshold: f64,

  /// Classification of Mixed cells that cannot be subdivided further.
  pub mixed_leaf_policy: MixedLeafPolicy,

  /// Agent radius used when a request does not carry one.
  pub default_agent_radius: f64,

  /// Subtrees above this depth are classified on the rayon pool.
  pub parallel_depth: u8,
}

impl NavConfig {
  /// Create a config for the given bounds and depth, other fields default.
  pub fn new(bounds: DAabb3, max_depth: u8) -> Self {
    Self {
      bounds,
      max_depth,
      ..Default::default()
    }
  }

  /// Reject configurations the builder cannot honour.
  pub fn validate(&self) -> NavResult<()> {
    let size = self.bounds.size();
    if !(size.x > 0.0 && size.y > 0.0 && size.z > 0.0) || !size.is_finite() {
      return Err(NavError::InvalidConfig(format!(
        "bounds must have positive finite extent, got {size:?}"
      )));
    }
    if self.max_depth > MAX_SUPPORTED_DEPTH {
      return Err(NavError::InvalidConfig(format!(
        "max_depth {} exceeds supported maximum {}",
        self.max_depth, MAX_SUPPORTED_DEPTH
      )));
    }
    if !(self.occupancy_threshold > 0.0 && self.occupancy_threshold <= 1.0) {
      return Err(NavError::InvalidConfig(format!(
        "occupancy_threshold must be in (0, 1], got {}",
        self.occupancy_threshold
      )));
    }
    if !(self.default_agent_radius.is_finite() && self.default_agent_radius >= 0.0) {
      return Err(NavError::InvalidConfig(format!(
        "default_agent_radius must be finite and non-negative, got {}",
        self.default_agent_radius
      )));
    }
    Ok(())
  }

  /// Cell size at the given depth.
  /// cell_size = bounds.size / 2^depth
  #[inline]
  pub fn cell_size(&self, depth: u8) -> DVec3 {
    self.bounds.size() / (1u64 << depth) as f64
  }

  /// Size of a max-depth leaf.
  #[inline]
  pub fn leaf_size(&self) -> DVec3 {
    self.cell_size(self.max_depth)
  }

  /// Get world-space minimum corner of a cell.
  #[inline]
  pub fn cell_min(&self, cell: &CellKey) -> DVec3 {
    let size = self.cell_size(cell.depth);
    self.bounds.min + DVec3::new(cell.x as f64, cell.y as f64, cell.z as f64) * size
  }

  /// Get world-space bounds of a cell.
  #[inline]
  pub fn cell_bounds(&self, cell: &CellKey) -> DAabb3 {
    let min = self.cell_min(cell);
    DAabb3::new(min, min + self.cell_size(cell.depth))
  }

  /// Get world-space center of a cell.
  #[inline]
  pub fn cell_center(&self, cell: &CellKey) -> DVec3 {
    self.cell_min(cell) + self.cell_size(cell.depth) * 0.5
  }

  /// Cell at `depth` containing `point`, or None when the point is outside the bounds.
  ///
  /// Points on the max face of the volume map into the last cell.
  pub fn cell_at_point(&self, point: DVec3, depth: u8) -> Option<CellKey> {
    if !self.bounds.contains_point(point) {
      return None;
    }
    let extent = CellKey::grid_extent(depth);
    let rel = (point - self.bounds.min) / self.cell_size(depth);
    let clamp = |v: f64| (v.floor().max(0.0) as u32).min(extent - 1);
    Some(CellKey::new(clamp(rel.x), clamp(rel.y), clamp(rel.z), depth))
  }
}

impl Default for NavConfig {
  fn default() -> Self {
    Self {
      bounds: DAabb3::new(DVec3::ZERO, DVec3::splat(1024.0)),
      max_depth: 6,
      connectivity: Connectivity::TwentySix,
      occupancy_threshold: 1.0,
      mixed_leaf_policy: MixedLeafPolicy::Blocked,
      default_agent_radius: 0.0,
      parallel_depth: 2,
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
