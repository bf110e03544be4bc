//! Scene files: settings, obstacles, queries and scripted updates.
//!
//! ```toml
//! [settings.volume]
//! bounds = { min = [0.0, 0.0, 0.0], max = [64.0, 64.0, 64.0] }
//! max_depth = 6
//!
//! [[obstacles]]
//! min = [20.0, 0.0, 0.0]
//! max = [22.0, 64.0, 40.0]
//!
//! [[queries]]
//! start = [2.0, 2.0, 2.0]
//! goal = [60.0, 2.0, 2.0]
//! radius = 0.5
//! priority = "high"
//!
//! [[updates]]
//! remove = [0]
//! add = [{ min = [30.0, 0.0, 30.0], max = [34.0, 64.0, 34.0] }]
//! ```

use anyhow::{Context, Result};
use glam::DVec3;
use octnav::{AdjacencyFilter, DAabb3, NavSettings, PathRequest, QueryPriority};
use serde::Deserialize;
use std::path::Path;

/// Root of a scene file.
#[derive(Debug, Deserialize)]
pub struct Scene {
	/// Engine settings. Missing tables use defaults.
	#[serde(default)]
	pub settings: NavSettings,
	/// Solid boxes present at build time.
	#[serde(default)]
	pub obstacles: Vec<DAabb3>,
	/// Queries run after the build and after every update step.
	#[serde(default)]
	pub queries: Vec<QuerySpec>,
	/// Geometry changes applied in order.
	#[serde(default)]
	pub updates: Vec<UpdateSpec>,
	/// Reachability probes.
	#[serde(default)]
	pub floods: Vec<FloodSpec>,
}

/// One path query.
#[derive(Debug, Clone, Deserialize)]
pub struct QuerySpec {
	pub start: DVec3,
	pub goal: DVec3,
	/// Agent radius (default: the volume's default radius).
	pub radius: Option<f64>,
	#[serde(default)]
	pub priority: QueryPriority,
	/// Only traverse face links.
	#[serde(default)]
	pub faces_only: bool,
}

impl QuerySpec {
	pub fn request(&self) -> PathRequest {
		let mut request = PathRequest::new(self.start, self.goal);
		request.agent_radius = self.radius;
		if self.faces_only {
			request = request.with_filter(AdjacencyFilter::FACE);
		}
		request
	}
}

/// One update step: obstacles removed by index, new obstacles added.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateSpec {
	/// Indices into the scene's obstacle list (build-time obstacles first, then added ones).
	pub remove: Vec<usize>,
	pub add: Vec<DAabb3>,
}

/// Flood fill from a point.
#[derive(Debug, Clone, Deserialize)]
pub struct FloodSpec {
	pub origin: DVec3,
	pub max_distance: f64,
	#[serde(default = "default_max_points")]
	pub max_points: usize,
}

fn default_max_points() -> usize {
	256
}

impl Scene {
	/// Load a scene from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read scene file: {}", path.display()))?;
		let scene: Scene = toml::from_str(&content).with_context(|| "Failed to parse scene TOML")?;

		scene.settings.validate().context("Invalid scene settings")?;
		if scene.queries.is_empty() && scene.floods.is_empty() {
			anyhow::bail!("Scene must have at least one query or flood probe");
		}
		for (i, obstacle) in scene.obstacles.iter().enumerate() {
			if !(obstacle.min.cmple(obstacle.max).all()) {
				anyhow::bail!("Obstacle {i} has min > max: {obstacle:?}");
			}
		}

		Ok(scene)
	}
}
