//! UpdateManager - owns the published snapshot and applies geometry changes.
//!
//! ```text
//!   notify(region) ──► clip ──► rebuilt(region) ──► record region ──► swap Arc
//!                      │          (rebuild lock held)                  (write lock, pointer only)
//!                      └── OutOfBounds
//! ```
//!
//! Readers clone the current `Arc<NavVolume>` and keep planning against it
//! for as long as they like. A rebuild works on its own copy-on-write arena,
//! so the only moment a reader can contend with an update is the pointer swap.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use glam::DVec3;
use web_time::Instant;

use crate::error::{NavError, NavResult};
use crate::geometry::CollisionQuery;
use crate::metrics::TimingHistory;
use crate::octree::{build_volume, DAabb3, NavConfig, NavVolume, RebuildStats, VolumeId};
use crate::planner::NavPath;

/// Changed regions kept for staleness checks.
pub const HISTORY_CAPACITY: usize = 1024;

/// Outcome of one published update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
  /// Generation that is now live.
  pub generation: u64,
  pub stats: RebuildStats,
  pub elapsed_us: u64,
}

#[derive(Debug, Default)]
struct ChangeLog {
  /// (generation, clipped region) in publication order.
  entries: VecDeque<(u64, DAabb3)>,
  /// Paths older than this generation can no longer be checked.
  floor: u64,
}

/// Publishes navigation snapshots and rebuilds them when geometry changes.
pub struct UpdateManager {
  geometry: Arc<dyn CollisionQuery>,
  current: RwLock<Arc<NavVolume>>,
  /// Serializes rebuilds; readers never take it.
  rebuild_lock: Mutex<()>,
  changes: Mutex<ChangeLog>,
  rebuild_timings: Mutex<TimingHistory>,
}

impl UpdateManager {
  /// Build generation 1 from `geometry` and start serving it.
  pub fn build(config: &NavConfig, geometry: Arc<dyn CollisionQuery>) -> NavResult<Self> {
    let volume = build_volume(config, geometry.as_ref(), VolumeId::new(), 1)?;
    Ok(Self::new(volume, geometry))
  }

  /// Serve an already built volume.
  pub fn new(volume: NavVolume, geometry: Arc<dyn CollisionQuery>) -> Self {
    let floor = volume.generation();
    tracing::info!(
      volume = volume.id().raw(),
      generation = volume.generation(),
      nodes = volume.stats().nodes,
      "snapshot published"
    );
    Self {
      geometry,
      current: RwLock::new(Arc::new(volume)),
      rebuild_lock: Mutex::new(()),
      changes: Mutex::new(ChangeLog {
        entries: VecDeque::new(),
        floor,
      }),
      rebuild_timings: Mutex::new(TimingHistory::default()),
    }
  }

  /// The live snapshot. Holding it keeps that generation alive.
  pub fn snapshot(&self) -> Arc<NavVolume> {
    Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
  }

  pub fn generation(&self) -> u64 {
    self.snapshot().generation()
  }

  pub fn geometry(&self) -> &Arc<dyn CollisionQuery> {
    &self.geometry
  }

  /// Recent rebuild durations (empty unless timing collection is enabled).
  pub fn rebuild_timings(&self) -> TimingHistory {
    self
      .rebuild_timings
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// Geometry inside `region` changed. Rebuild it and publish a new generation.
  pub fn notify(&self, region: DAabb3) -> NavResult<UpdateReport> {
    self.notify_many(&[region])
  }

  /// Several regions changed. All of them go into a single new generation.
  ///
  /// Regions are clipped to the volume. If none of them overlaps it, nothing
  /// is published and `OutOfBounds` names the first region.
  #[tracing::instrument(skip_all, name = "update::notify", fields(regions = regions.len()))]
  pub fn notify_many(&self, regions: &[DAabb3]) -> NavResult<UpdateReport> {
    let _guard = self.rebuild_lock.lock().unwrap_or_else(PoisonError::into_inner);
    let current = self.snapshot();
    let Some(&first) = regions.first() else {
      return Ok(UpdateReport {
        generation: current.generation(),
        ..Default::default()
      });
    };

    let bounds = current.bounds();
    let clipped: Vec<DAabb3> = regions.iter().filter_map(|r| r.intersection(&bounds)).collect();
    if clipped.is_empty() {
      return Err(NavError::OutOfBounds { region: first });
    }

    let started = Instant::now();
    let generation = current.generation() + 1;
    let (volume, stats) = match current.rebuilt(self.geometry.as_ref(), &clipped, generation) {
      Ok(rebuilt) => rebuilt,
      Err(err) => {
        tracing::warn!(error = %err, live = current.generation(), "rebuild failed, keeping live generation");
        return Err(err);
      }
    };
    let elapsed_us = started.elapsed().as_micros() as u64;

    self.publish(volume, &clipped, elapsed_us);
    Ok(UpdateReport {
      generation,
      stats,
      elapsed_us,
    })
  }

  /// Rebuild the whole volume from scratch. Every existing path becomes stale.
  #[tracing::instrument(skip_all, name = "update::rebuild_all")]
  pub fn rebuild_all(&self) -> NavResult<UpdateReport> {
    let _guard = self.rebuild_lock.lock().unwrap_or_else(PoisonError::into_inner);
    let current = self.snapshot();
    let started = Instant::now();
    let generation = current.generation() + 1;
    let volume = build_volume(current.config(), self.geometry.as_ref(), current.id(), generation)
      .inspect_err(|err| tracing::warn!(error = %err, "full rebuild failed, keeping live generation"))?;
    let elapsed_us = started.elapsed().as_micros() as u64;

    let stats = RebuildStats {
      reclassified: volume.stats().nodes,
      retired: current.stats().nodes,
      created: volume.stats().nodes,
      relinked_leaves: volume.stats().free_leaves,
    };
    self.publish(volume, &[current.bounds()], elapsed_us);
    Ok(UpdateReport {
      generation,
      stats,
      elapsed_us,
    })
  }

  fn publish(&self, volume: NavVolume, regions: &[DAabb3], elapsed_us: u64) {
    let generation = volume.generation();
    {
      let mut changes = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
      for region in regions {
        changes.entries.push_back((generation, *region));
      }
      while changes.entries.len() > HISTORY_CAPACITY {
        if let Some((evicted, _)) = changes.entries.pop_front() {
          changes.floor = changes.floor.max(evicted);
        }
      }
    }
    self
      .rebuild_timings
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .record(elapsed_us);

    tracing::info!(
      generation,
      nodes = volume.stats().nodes,
      free_leaves = volume.stats().free_leaves,
      elapsed_us,
      "snapshot published"
    );
    *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(volume);
  }

  /// True when geometry changed along `path` since the generation it was planned on.
  ///
  /// Each changed region, inflated by the path's agent radius, is tested
  /// against every waypoint segment. Paths from another volume, or older than
  /// the retained history, are always stale.
  pub fn is_path_stale(&self, path: &NavPath) -> bool {
    if path.volume != self.snapshot().id() {
      return true;
    }
    let changes = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
    if path.generation < changes.floor {
      return true;
    }
    changes
      .entries
      .iter()
      .filter(|(generation, _)| *generation > path.generation)
      .any(|(_, region)| crosses(&region.expanded(path.agent_radius), &path.waypoints))
  }
}

fn crosses(region: &DAabb3, waypoints: &[DVec3]) -> bool {
  match waypoints {
    [] => false,
    [only] => region.contains_point(*only),
    _ => waypoints.windows(2).any(|w| region.segment_hits_interior(w[0], w[1])),
  }
}

#[cfg(test)]
#[path = "update_test.rs"]
mod update_test;
