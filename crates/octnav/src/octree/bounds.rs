//! World-space boxes: the navigable volume, node cells, solids and update regions.

use glam::DVec3;
use serde::Deserialize;

/// Closed axis-aligned box in f64 world units.
///
/// Navigable volumes can span kilometers while leaves stay at centimeter
/// scale, so everything spatial in the crate works in double precision.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct DAabb3 {
	pub min: DVec3,
	pub max: DVec3,
}

impl DAabb3 {
	/// Box spanning `min..=max`. Debug builds reject inverted corners.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(min.cmple(max).all(), "inverted box: min {min:?} > max {max:?}");
		Self { min, max }
	}

	/// Cube or cuboid around `center`.
	pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
		Self::new(center - half_extents, center + half_extents)
	}

	/// True when the closed boxes share at least one point (touching counts).
	#[inline]
	pub fn overlaps(&self, other: &DAabb3) -> bool {
		self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
	}

	/// True when the open interiors intersect. Face, edge or corner contact is not enough.
	#[inline]
	pub fn overlaps_interior(&self, other: &DAabb3) -> bool {
		self.min.cmplt(other.max).all() && other.min.cmplt(self.max).all()
	}

	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		self.min.cmple(point).all() && point.cmple(self.max).all()
	}

	/// True when `other` fits entirely inside this box.
	#[inline]
	pub fn contains_aabb(&self, other: &DAabb3) -> bool {
		self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
	}

	/// Shared region of the two boxes. Touching boxes yield a degenerate box.
	pub fn intersection(&self, other: &DAabb3) -> Option<DAabb3> {
		self.overlaps(other).then(|| DAabb3 {
			min: self.min.max(other.min),
			max: self.max.min(other.max),
		})
	}

	/// Inflate by `amount` on every side.
	#[inline]
	pub fn expanded(&self, amount: f64) -> DAabb3 {
		let pad = DVec3::splat(amount);
		DAabb3 {
			min: self.min - pad,
			max: self.max + pad,
		}
	}

	#[inline]
	pub fn size(&self) -> DVec3 {
		self.max - self.min
	}

	#[inline]
	pub fn volume(&self) -> f64 {
		self.size().element_product()
	}

	#[inline]
	pub fn center(&self) -> DVec3 {
		self.min.lerp(self.max, 0.5)
	}

	/// Check whether the segment `a -> b` passes through the open interior of the box.
	///
	/// Slab test. Segments that only graze a face or edge are not hits, so a path may
	/// run along the surface of an obstacle.
	pub fn segment_hits_interior(&self, a: DVec3, b: DVec3) -> bool {
		let dir = b - a;
		let mut t_enter = 0.0_f64;
		let mut t_exit = 1.0_f64;

		for axis in 0..3 {
			let origin = a[axis];
			let d = dir[axis];
			let lo = self.min[axis];
			let hi = self.max[axis];

			if d.abs() < f64::EPSILON {
				if origin <= lo || origin >= hi {
					return false;
				}
				continue;
			}

			let inv = 1.0 / d;
			let mut t0 = (lo - origin) * inv;
			let mut t1 = (hi - origin) * inv;
			if t0 > t1 {
				std::mem::swap(&mut t0, &mut t1);
			}
			t_enter = t_enter.max(t0);
			t_exit = t_exit.min(t1);
			if t_enter >= t_exit {
				return false;
			}
		}

		t_exit - t_enter > 1e-12
	}
}
