//! Voxel classifier: one collision query per cell, mapped to an occupancy.
//!
//! ```text
//!   coverage == 0            -> Free
//!   coverage >= threshold    -> Blocked
//!   otherwise                -> Mixed  (Blocked at max depth by default)
//! ```

use super::config::MixedLeafPolicy;
use super::{CellKey, DAabb3, NavConfig};
use crate::error::{GeometryError, NavResult};
use crate::geometry::CollisionQuery;

/// Occupancy state of a cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Occupancy {
  /// No obstruction inside the cell.
  Free,
  /// Cell is obstructed (fully, or at or above the occupancy threshold).
  Blocked,
  /// Partially obstructed; subdivided unless at max depth.
  Mixed,
}

/// Classify a box against the geometry.
///
/// Pure query: no state is kept between calls.
pub fn classify_bounds<G: CollisionQuery + ?Sized>(
  geometry: &G,
  bounds: &DAabb3,
  occupancy_threshold: f64,
) -> Result<Occupancy, GeometryError> {
  let coverage = geometry.coverage(bounds)?;
  if !coverage.is_finite() {
    return Err(GeometryError::QueryFailed {
      min: bounds.min.to_array(),
      max: bounds.max.to_array(),
      reason: format!("non-finite coverage {coverage}"),
    });
  }

  Ok(if coverage <= 0.0 {
    Occupancy::Free
  } else if coverage >= occupancy_threshold {
    Occupancy::Blocked
  } else {
    Occupancy::Mixed
  })
}

/// Classify a cell, applying the max-depth policy.
///
/// Never returns Mixed for a cell at `config.max_depth`.
pub fn classify_cell<G: CollisionQuery + ?Sized>(
  config: &NavConfig,
  geometry: &G,
  cell: CellKey,
) -> NavResult<Occupancy> {
  let occupancy = classify_bounds(geometry, &config.cell_bounds(&cell), config.occupancy_threshold)?;
  if occupancy == Occupancy::Mixed && cell.depth >= config.max_depth {
    return Ok(match config.mixed_leaf_policy {
      MixedLeafPolicy::Blocked => Occupancy::Blocked,
      MixedLeafPolicy::Free => Occupancy::Free,
    });
  }
  Ok(occupancy)
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod classify_test;
