//! Path smoothing: greedy line-of-sight pulling and optional corner cutting.
//!
//! ```text
//!   raw:     S ── c1 ── c2 ── c3 ── c4 ── G
//!   pulled:  S ────────────── c3 ──────── G     (S sees c3, not c4)
//! ```
//!
//! Visibility is supplied by the caller, usually a swept segment test against
//! Blocked leaves. Consecutive raw points are trusted because the planner
//! validated every edge it returned.

use glam::DVec3;

use crate::planner::PlannerSettings;

/// Greedy string pulling.
///
/// From each anchor, scans from the last point backwards and keeps the first
/// one that is visible. The neighbor of the anchor is always accepted. Running
/// this on its own output returns the same points.
pub fn string_pull<F>(points: &[DVec3], mut visible: F) -> Vec<DVec3>
where
  F: FnMut(DVec3, DVec3) -> bool,
{
  if points.len() <= 2 {
    return points.to_vec();
  }

  let mut out = vec![points[0]];
  let mut anchor = 0;
  let last = points.len() - 1;
  while anchor < last {
    let mut next = anchor + 1;
    for candidate in (anchor + 2..=last).rev() {
      if visible(points[anchor], points[candidate]) {
        next = candidate;
        break;
      }
    }
    out.push(points[next]);
    anchor = next;
  }
  out
}

/// One Chaikin corner-cutting pass per iteration. Endpoints stay fixed.
pub fn chaikin(points: &[DVec3], iterations: u32) -> Vec<DVec3> {
  let mut current = points.to_vec();
  for _ in 0..iterations {
    if current.len() < 3 {
      break;
    }
    let mut next = Vec::with_capacity(current.len() * 2);
    next.push(current[0]);
    let last = current.len() - 2;
    for (i, pair) in current.windows(2).enumerate() {
      let (a, b) = (pair[0], pair[1]);
      let q = a.lerp(b, 0.25);
      let r = a.lerp(b, 0.75);
      if i != 0 {
        next.push(q);
      }
      if i != last {
        next.push(r);
      }
    }
    next.push(current[current.len() - 1]);
    current = next;
  }
  current
}

/// Total Euclidean length of a polyline.
pub fn path_length(points: &[DVec3]) -> f64 {
  points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Smooth a raw point path according to the planner settings.
///
/// Each Chaikin pass is accepted only if every new segment is visible; the
/// first failing pass ends refinement with the previous sequence.
pub fn smooth_path<F>(raw: &[DVec3], settings: &PlannerSettings, mut visible: F) -> Vec<DVec3>
where
  F: FnMut(DVec3, DVec3) -> bool,
{
  let mut points = if settings.string_pulling {
    string_pull(raw, &mut visible)
  } else {
    raw.to_vec()
  };

  for pass in 0..settings.chaikin_iterations {
    let refined = chaikin(&points, 1);
    if !refined.windows(2).all(|w| visible(w[0], w[1])) {
      tracing::trace!(pass, "chaikin pass rejected");
      break;
    }
    points = refined;
  }
  points
}

#[cfg(test)]
#[path = "smoother_test.rs"]
mod smoother_test;
