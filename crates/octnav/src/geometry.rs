//! Geometry collision-query capability supplied by the host world.
//!
//! The navigation core never looks at meshes, colliders or any other geometry
//! representation. It only asks "how much of this box is obstructed?".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::GeometryError;
use crate::octree::DAabb3;

/// Box-vs-world collision query.
///
/// Implementations must be thread-safe: classification runs on the rayon pool.
pub trait CollisionQuery: Send + Sync {
  /// Fraction of `bounds` covered by obstructions, in `[0, 1]`.
  ///
  /// `0.0` means no intersection at all. Implementations that can only answer
  /// yes/no should return a value strictly between 0 and 1 for any intersection
  /// they cannot prove to be total; the builder then keeps subdividing.
  fn coverage(&self, bounds: &DAabb3) -> Result<f64, GeometryError>;

  /// True when any obstruction intersects `bounds`.
  fn intersects(&self, bounds: &DAabb3) -> Result<bool, GeometryError> {
    Ok(self.coverage(bounds)? > 0.0)
  }
}

impl<T: CollisionQuery + ?Sized> CollisionQuery for Arc<T> {
  fn coverage(&self, bounds: &DAabb3) -> Result<f64, GeometryError> {
    (**self).coverage(bounds)
  }

  fn intersects(&self, bounds: &DAabb3) -> Result<bool, GeometryError> {
    (**self).intersects(bounds)
  }
}

impl<T: CollisionQuery + ?Sized> CollisionQuery for Box<T> {
  fn coverage(&self, bounds: &DAabb3) -> Result<f64, GeometryError> {
    (**self).coverage(bounds)
  }

  fn intersects(&self, bounds: &DAabb3) -> Result<bool, GeometryError> {
    (**self).intersects(bounds)
  }
}

// =============================================================================
// EmptyWorld
// =============================================================================

/// Geometry with no obstructions.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyWorld;

impl CollisionQuery for EmptyWorld {
  fn coverage(&self, _bounds: &DAabb3) -> Result<f64, GeometryError> {
    Ok(0.0)
  }
}

// =============================================================================
// BoxField - axis-aligned solid boxes
// =============================================================================

/// Largest coverage reported for a box that no single solid fully contains.
const PARTIAL_COVERAGE_MAX: f64 = 1.0 - 1e-9;

/// Handle to a solid inserted into a [`BoxField`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SolidId(u64);

/// A set of solid axis-aligned boxes.
///
/// Solids can be added, moved and removed at runtime; each mutation returns the
/// region whose occupancy may have changed so the caller can pass it on to
/// [`crate::update::UpdateManager::notify`].
///
/// Fractional coverage sums per-solid overlap volumes, so it assumes solids do
/// not overlap each other. Full coverage is only reported when a single solid
/// contains the whole query box.
#[derive(Debug, Default)]
pub struct BoxField {
  solids: RwLock<Vec<(SolidId, DAabb3)>>,
  next_id: AtomicU64,
}

impl BoxField {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a field from a list of solids.
  pub fn from_boxes(boxes: impl IntoIterator<Item = DAabb3>) -> Self {
    let field = Self::new();
    for b in boxes {
      field.insert(b);
    }
    field
  }

  /// Add a solid, returning its handle.
  pub fn insert(&self, bounds: DAabb3) -> SolidId {
    let id = SolidId(self.next_id.fetch_add(1, Ordering::Relaxed));
    self
      .solids
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .push((id, bounds));
    id
  }

  /// Remove a solid. Returns the region it occupied.
  pub fn remove(&self, id: SolidId) -> Option<DAabb3> {
    let mut solids = self.solids.write().unwrap_or_else(PoisonError::into_inner);
    let pos = solids.iter().position(|(sid, _)| *sid == id)?;
    Some(solids.remove(pos).1)
  }

  /// Move a solid. Returns the union of its old and new bounds.
  pub fn relocate(&self, id: SolidId, bounds: DAabb3) -> Option<DAabb3> {
    let mut solids = self.solids.write().unwrap_or_else(PoisonError::into_inner);
    let entry = solids.iter_mut().find(|(sid, _)| *sid == id)?;
    let old = entry.1;
    entry.1 = bounds;
    Some(DAabb3::new(old.min.min(bounds.min), old.max.max(bounds.max)))
  }

  /// Number of solids.
  pub fn len(&self) -> usize {
    self.solids.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl CollisionQuery for BoxField {
  fn coverage(&self, bounds: &DAabb3) -> Result<f64, GeometryError> {
    let solids = self
      .solids
      .read()
      .map_err(|_| GeometryError::Unavailable("box field lock poisoned".into()))?;

    let volume = bounds.volume();
    let mut covered = 0.0;
    for (_, solid) in solids.iter() {
      if !solid.overlaps_interior(bounds) {
        continue;
      }
      if solid.contains_aabb(bounds) {
        return Ok(1.0);
      }
      if let Some(overlap) = solid.intersection(bounds) {
        covered += overlap.volume();
      }
    }

    if covered <= 0.0 || volume <= 0.0 {
      return Ok(0.0);
    }
    Ok((covered / volume).min(PARTIAL_COVERAGE_MAX))
  }

  fn intersects(&self, bounds: &DAabb3) -> Result<bool, GeometryError> {
    let solids = self
      .solids
      .read()
      .map_err(|_| GeometryError::Unavailable("box field lock poisoned".into()))?;
    Ok(solids.iter().any(|(_, solid)| solid.overlaps_interior(bounds)))
  }
}
