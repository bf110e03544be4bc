//! Search limits and smoothing switches for the planner.
//!
//! The expansion cap bounds every search, so a pathological topology costs a
//! fixed amount of work and ends in NoPath rather than hanging a worker.

use serde::Deserialize;

use crate::error::{NavError, NavResult};

/// Planner configuration.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
	/// Maximum node expansions per search (0 = unlimited).
	pub max_expansions: usize,
	/// Multiplier on the straight-line heuristic. Above 1.0 trades optimality for speed.
	pub heuristic_weight: f64,
	/// Fixed cost per edge instead of center-to-center distance.
	pub unit_cost: Option<f64>,
	/// Run greedy line-of-sight pulling on the raw path.
	pub string_pulling: bool,
	/// Chaikin corner-cutting passes after pulling (0 = off).
	pub chaikin_iterations: u32,
	/// Discount on cost and heuristic for coarse leaves, in `[0, 1]` (0 = off).
	///
	/// Nonzero values favor large open leaves and cut expansions in sparse
	/// volumes. The heuristic is then no longer admissible, so paths may be
	/// longer than the shortest leaf route.
	pub node_size_weight: f64,
}

impl PlannerSettings {
	/// Default limits.
	pub const DEFAULT: Self = Self {
		max_expansions: 5000,
		heuristic_weight: 1.0,
		unit_cost: None,
		string_pulling: true,
		chaikin_iterations: 0,
		node_size_weight: 0.0,
	};

	/// No expansion cap, for offline tools and tests.
	pub const EXHAUSTIVE: Self = Self {
		max_expansions: 0,
		heuristic_weight: 1.0,
		unit_cost: None,
		string_pulling: true,
		chaikin_iterations: 0,
		node_size_weight: 0.0,
	};

	/// Raw leaf paths, no smoothing.
	pub const RAW: Self = Self {
		max_expansions: 5000,
		heuristic_weight: 1.0,
		unit_cost: None,
		string_pulling: false,
		chaikin_iterations: 0,
		node_size_weight: 0.0,
	};

	/// Check if another expansion is allowed.
	#[inline]
	pub fn can_expand(&self, performed: usize) -> bool {
		self.max_expansions == 0 || performed < self.max_expansions
	}

	/// Multiplier for a leaf at `depth` in a tree of `max_depth`.
	///
	/// 1.0 at the deepest level, falling linearly toward `1 - node_size_weight`
	/// at the root.
	#[inline]
	pub fn size_factor(&self, depth: u8, max_depth: u8) -> f64 {
		if self.node_size_weight == 0.0 {
			return 1.0;
		}
		let coarseness = f64::from(max_depth.saturating_sub(depth)) / (f64::from(max_depth) + 1.0);
		1.0 - self.node_size_weight * coarseness
	}

	pub fn validate(&self) -> NavResult<()> {
		if !(self.heuristic_weight.is_finite() && self.heuristic_weight >= 0.0) {
			return Err(NavError::InvalidConfig(format!(
				"heuristic_weight must be finite and non-negative, got {}",
				self.heuristic_weight
			)));
		}
		if !(0.0..=1.0).contains(&self.node_size_weight) {
			return Err(NavError::InvalidConfig(format!(
				"node_size_weight must be within [0, 1], got {}",
				self.node_size_weight
			)));
		}
		if let Some(cost) = self.unit_cost {
			if !(cost.is_finite() && cost > 0.0) {
				return Err(NavError::InvalidConfig(format!("unit_cost must be positive, got {cost}")));
			}
		}
		Ok(())
	}
}

impl Default for PlannerSettings {
	fn default() -> Self {
		Self::DEFAULT
	}
}
