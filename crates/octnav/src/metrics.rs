//! Load and timing metrics for queries and rebuilds.
//!
//! Counters are always maintained because the query scheduler reads them.
//! Timing histories are feature-gated and runtime-toggled, so they cost
//! nothing when disabled.
//!
//! # Usage
//!
//! ```ignore
//! use octnav::metrics::COLLECT_METRICS;
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let load = service.load();
//! println!("{} active, avg {:.0}us", load.active, load.average_query_us);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::planner::PathStatus;

/// Runtime toggle for timing collection.
/// Set to false to disable timing histories at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Smoothing factor for the query time moving average.
pub const EMA_ALPHA: f64 = 0.1;

/// Check if timing collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
    #[cfg(feature = "metrics")]
    {
        COLLECT_METRICS.load(Ordering::Relaxed)
    }
    #[cfg(not(feature = "metrics"))]
    {
        false
    }
}

// =============================================================================
// RollingWindow
// =============================================================================

/// Most recent durations in microseconds, oldest dropped first.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample_us: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample_us);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sum(&self) -> u64 {
        self.samples.iter().sum()
    }

    /// Mean of the retained samples, 0 when empty.
    pub fn average(&self) -> f64 {
        match self.samples.len() {
            0 => 0.0,
            n => self.sum() as f64 / n as f64,
        }
    }

    /// Fastest and slowest retained sample.
    pub fn min_max(&self) -> Option<(u64, u64)> {
        self.samples.iter().fold(None, |acc, &us| match acc {
            None => Some((us, us)),
            Some((lo, hi)) => Some((lo.min(us), hi.max(us))),
        })
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(128)
    }
}

// =============================================================================
// Timing history
// =============================================================================

/// Recent durations of one kind of work, in microseconds.
#[derive(Debug, Clone, Default)]
pub struct TimingHistory {
    pub timings: RollingWindow,
    pub last_us: u64,
}

impl TimingHistory {
    /// Record a duration when timing collection is enabled.
    pub fn record(&mut self, timing_us: u64) {
        if is_enabled() {
            self.timings.push(timing_us);
            self.last_us = timing_us;
        }
    }

    pub fn average_us(&self) -> f64 {
        self.timings.average()
    }
}

// =============================================================================
// Query load
// =============================================================================

/// Point-in-time view of the query service load.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadSnapshot {
    /// Waiting in the priority queue.
    pub pending: usize,
    /// Running on the pool.
    pub active: usize,
    pub completed: u64,
    /// Finished with NoPath or InvalidEndpoint.
    pub failed: u64,
    pub cancelled: u64,
    /// Exponential moving average of query time.
    pub average_query_us: f64,
    /// Rolling-window average; None unless timing collection is enabled.
    pub recent_query_us: Option<f64>,
}

/// Shared counters updated by the query service and its workers.
#[derive(Debug, Default)]
pub struct QueryMetrics {
    pending: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    /// f64 bits of the moving average.
    ema_us: AtomicU64,
    history: Mutex<TimingHistory>,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_queued(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// A queued query was handed to a worker.
    pub fn on_started(&self) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// A queued query was cancelled before it started.
    pub fn on_dropped(&self) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// A running query finished.
    pub fn on_finished(&self, status: PathStatus, elapsed_us: u64) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        match status {
            PathStatus::Success => self.completed.fetch_add(1, Ordering::Relaxed),
            PathStatus::Cancelled => self.cancelled.fetch_add(1, Ordering::Relaxed),
            PathStatus::NoPath | PathStatus::InvalidEndpoint => {
                self.failed.fetch_add(1, Ordering::Relaxed)
            }
        };
        self.update_ema(elapsed_us as f64);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(elapsed_us);
    }

    fn update_ema(&self, sample: f64) {
        let _ = self
            .ema_us
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let current = f64::from_bits(bits);
                let next = if bits == 0 {
                    sample
                } else {
                    current + EMA_ALPHA * (sample - current)
                };
                Some(next.to_bits())
            });
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> LoadSnapshot {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        LoadSnapshot {
            pending: self.pending.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            average_query_us: f64::from_bits(self.ema_us.load(Ordering::Relaxed)),
            recent_query_us: (!history.timings.is_empty()).then(|| history.average_us()),
        }
    }
}
