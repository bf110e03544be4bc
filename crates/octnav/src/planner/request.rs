//! Path requests, results and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::DVec3;

use crate::error::{NavError, NavResult};
use crate::octree::{AdjacencyKind, NodeId, VolumeId};

// =============================================================================
// Filter
// =============================================================================

/// Which adjacency kinds a query may traverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AdjacencyFilter(u8);

impl AdjacencyFilter {
  pub const FACE: Self = Self(1);
  pub const EDGE: Self = Self(2);
  pub const CORNER: Self = Self(4);
  pub const ALL: Self = Self(7);

  /// Combine two filters.
  #[inline]
  pub const fn with(self, other: Self) -> Self {
    Self(self.0 | other.0)
  }

  #[inline]
  pub fn allows(&self, kind: AdjacencyKind) -> bool {
    let bit = match kind {
      AdjacencyKind::Face => Self::FACE.0,
      AdjacencyKind::Edge => Self::EDGE.0,
      AdjacencyKind::Corner => Self::CORNER.0,
    };
    self.0 & bit != 0
  }
}

impl Default for AdjacencyFilter {
  fn default() -> Self {
    Self::ALL
  }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation flag, checked between search expansions.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
  /// Polls left before the token cancels itself.
  #[cfg(test)]
  polls_left: Option<Arc<std::sync::atomic::AtomicUsize>>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Token that cancels itself on the `polls`-th check, so a test can stop a
  /// search at an exact point between expansions.
  #[cfg(test)]
  pub(crate) fn cancel_on_poll(polls: usize) -> Self {
    Self {
      flag: Arc::default(),
      polls_left: Some(Arc::new(std::sync::atomic::AtomicUsize::new(polls))),
    }
  }

  /// Request cancellation. Idempotent.
  pub fn cancel(&self) {
    self.flag.store(true, Ordering::Release);
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool {
    #[cfg(test)]
    if let Some(left) = &self.polls_left {
      if left.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1)) == Ok(1) {
        self.cancel();
      }
    }
    self.flag.load(Ordering::Acquire)
  }
}

// =============================================================================
// Request
// =============================================================================

/// A single path query.
#[derive(Clone, Debug, PartialEq)]
pub struct PathRequest {
  pub start: DVec3,
  pub goal: DVec3,
  /// Agent radius; None uses the volume's default.
  pub agent_radius: Option<f64>,
  pub filter: AdjacencyFilter,
}

impl PathRequest {
  pub fn new(start: DVec3, goal: DVec3) -> Self {
    Self {
      start,
      goal,
      agent_radius: None,
      filter: AdjacencyFilter::ALL,
    }
  }

  pub fn with_radius(mut self, radius: f64) -> Self {
    self.agent_radius = Some(radius);
    self
  }

  pub fn with_filter(mut self, filter: AdjacencyFilter) -> Self {
    self.filter = filter;
    self
  }
}

// =============================================================================
// Results
// =============================================================================

/// Counters from one search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
  /// Nodes popped from the open set and expanded.
  pub expansions: usize,
  /// The search stopped because it reached the expansion cap.
  pub expansion_cap_hit: bool,
  /// Neighbors skipped for lack of clearance.
  pub clearance_rejections: usize,
  /// Wall time including smoothing.
  pub elapsed_us: u64,
}

/// A successful path.
#[derive(Clone, Debug, PartialEq)]
pub struct NavPath {
  pub volume: VolumeId,
  /// Generation of the snapshot the path was planned against.
  pub generation: u64,
  /// Smoothed waypoints; first is the request start, last the goal.
  pub waypoints: Vec<DVec3>,
  /// Unsmoothed points: start, intermediate leaf centers, goal. Endpoint
  /// leaf centers appear where the path had to bend through them.
  pub raw_points: Vec<DVec3>,
  /// Leaves traversed, start leaf first.
  pub leaves: Vec<NodeId>,
  pub agent_radius: f64,
  pub stats: SearchStats,
}

impl NavPath {
  /// Euclidean length of the smoothed path.
  pub fn length(&self) -> f64 {
    crate::smoother::path_length(&self.waypoints)
  }
}

/// Coarse outcome of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStatus {
  Success,
  NoPath,
  InvalidEndpoint,
  Cancelled,
}

impl From<&NavError> for PathStatus {
  fn from(err: &NavError) -> Self {
    match err {
      NavError::InvalidEndpoint { .. } => PathStatus::InvalidEndpoint,
      NavError::Cancelled => PathStatus::Cancelled,
      _ => PathStatus::NoPath,
    }
  }
}

/// Outcome delivered to asynchronous callers.
#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
  pub status: PathStatus,
  /// Present on Success.
  pub path: Option<NavPath>,
  /// Present on anything but Success.
  pub error: Option<NavError>,
  /// Position of this query in the service's dispatch order; 0 if it never started.
  pub dispatch_order: u64,
}

impl PathResult {
  pub fn from_outcome(outcome: NavResult<NavPath>, dispatch_order: u64) -> Self {
    match outcome {
      Ok(path) => Self {
        status: PathStatus::Success,
        path: Some(path),
        error: None,
        dispatch_order,
      },
      Err(err) => Self {
        status: PathStatus::from(&err),
        path: None,
        error: Some(err),
        dispatch_order,
      },
    }
  }

  /// Waypoints on Success, empty otherwise.
  pub fn waypoints(&self) -> &[DVec3] {
    self.path.as_ref().map(|p| p.waypoints.as_slice()).unwrap_or(&[])
  }

  pub fn is_success(&self) -> bool {
    self.status == PathStatus::Success
  }

  /// Back to a `Result`.
  pub fn into_result(self) -> NavResult<NavPath> {
    match (self.path, self.error) {
      (Some(path), _) => Ok(path),
      (None, Some(err)) => Err(err),
      (None, None) => Err(NavError::Cancelled),
    }
  }
}
