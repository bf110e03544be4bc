//! TOML settings bundle: volume, planner and service configuration.
//!
//! ```toml
//! [volume]
//! bounds = { min = [0.0, 0.0, 0.0], max = [256.0, 64.0, 256.0] }
//! max_depth = 7
//! connectivity = "eighteen"
//!
//! [planner]
//! max_expansions = 20000
//!
//! [service]
//! max_concurrent = 4
//! ```
//!
//! Every table and field is optional and falls back to its default.

use std::path::Path;

use serde::Deserialize;

use crate::error::{NavError, NavResult};
use crate::octree::NavConfig;
use crate::planner::PlannerSettings;
use crate::service::ServiceSettings;

/// All engine settings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavSettings {
	pub volume: NavConfig,
	pub planner: PlannerSettings,
	pub service: ServiceSettings,
}

impl NavSettings {
	/// Parse and validate settings from TOML text.
	pub fn from_toml_str(content: &str) -> NavResult<Self> {
		let settings: NavSettings =
			toml::from_str(content).map_err(|e| NavError::Settings(e.to_string()))?;
		settings.validate()?;
		Ok(settings)
	}

	/// Load settings from a TOML file.
	pub fn load(path: &Path) -> NavResult<Self> {
		let content = std::fs::read_to_string(path)
			.map_err(|e| NavError::Settings(format!("failed to read {}: {e}", path.display())))?;
		Self::from_toml_str(&content)
	}

	pub fn validate(&self) -> NavResult<()> {
		self.volume.validate()?;
		self.planner.validate()?;
		self.service.validate()
	}
}
