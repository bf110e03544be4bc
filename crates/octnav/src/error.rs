//! Error taxonomy for building, planning and updating.
//!
//! Every failure reaches the caller as a typed value. A failed rebuild never
//! takes down the generation that is currently being served.

use thiserror::Error;

use crate::octree::DAabb3;

/// Which end of a path request was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
  Start,
  Goal,
}

/// Why an endpoint was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointReason {
  /// The point lies outside the volume bounds.
  OutsideVolume,
  /// The point lies inside a Blocked leaf.
  Blocked,
}

/// Failure reported by a geometry collision-query collaborator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
  #[error("geometry source unavailable: {0}")]
  Unavailable(String),
  #[error("collision query failed for box {min:?}..{max:?}: {reason}")]
  QueryFailed {
    min: [f64; 3],
    max: [f64; 3],
    reason: String,
  },
}

/// Errors produced by the navigation engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NavError {
  #[error("invalid {endpoint:?} endpoint: {reason:?}")]
  InvalidEndpoint {
    endpoint: Endpoint,
    reason: EndpointReason,
  },
  #[error("no path found after {expansions} expansions (cap hit: {expansion_cap_hit})")]
  NoPath {
    expansions: usize,
    expansion_cap_hit: bool,
  },
  #[error("query cancelled")]
  Cancelled,
  #[error("update region {region:?} lies outside the navigable volume")]
  OutOfBounds { region: DAabb3 },
  #[error("volume build failed: {0}")]
  BuildFailure(#[from] GeometryError),
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
  #[error("settings error: {0}")]
  Settings(String),
}

impl NavError {
  /// Shorthand for an endpoint failure.
  pub fn endpoint(endpoint: Endpoint, reason: EndpointReason) -> Self {
    Self::InvalidEndpoint { endpoint, reason }
  }
}

/// Result alias used throughout the crate.
pub type NavResult<T> = Result<T, NavError>;
