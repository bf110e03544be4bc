//! Per-query clearance for agents with a radius.
//!
//! Clearance depends on the agent, so it is never stored in the shared
//! snapshot. Each query keeps its own memo of the leaves it has checked.

use std::collections::HashMap;

use crate::octree::{DAabb3, NavVolume, NodeId};

pub struct ClearanceCache<'a> {
  volume: &'a NavVolume,
  radius: f64,
  memo: HashMap<NodeId, bool>,
}

impl<'a> ClearanceCache<'a> {
  pub fn new(volume: &'a NavVolume, radius: f64) -> Self {
    Self {
      volume,
      radius: radius.max(0.0),
      memo: HashMap::new(),
    }
  }

  /// True when an agent centred on the leaf center touches no Blocked leaf.
  pub fn passable(&mut self, id: NodeId) -> bool {
    if self.radius <= 0.0 {
      return true;
    }
    if let Some(&known) = self.memo.get(&id) {
      return known;
    }
    let Some(bounds) = self.volume.node_bounds(id) else {
      return false;
    };

    // The agent fits inside the Free leaf itself.
    let half_min = bounds.size().min_element() * 0.5;
    let ok = if self.radius <= half_min {
      true
    } else {
      let probe = DAabb3::from_center_half_extents(bounds.center(), glam::DVec3::splat(self.radius));
      !self.volume.any_blocked_within(&probe)
    };
    self.memo.insert(id, ok);
    ok
  }
}
