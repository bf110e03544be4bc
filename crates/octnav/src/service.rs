//! Query Service - prioritized, bounded, cancellable path queries.
//!
//! # Flow
//!
//! ```text
//! Caller                           Service                      rayon pool
//! ┌──────────────┐  submit()  ┌──────────────────┐
//! │ PathRequest  │───────────►│ priority queue   │  pump()   ┌──────────────────┐
//! └──────────────┘            │ (priority, seq)  │──────────►│ snapshot()       │
//!                             └──────────────────┘  ≤ max    │ plan_path()      │
//! ┌──────────────┐                                 concurrent└────────┬─────────┘
//! │ PathTicket   │◄───────────────────────────────────────────────────┘
//! │ wait()/try_  │            bounded(1) channel per ticket
//! └──────────────┘
//! ```
//!
//! A query reads the snapshot that is live when it is dispatched, not when it
//! was submitted, and keeps reading it to the end even if an update publishes
//! a newer generation meanwhile.
//!
//! # Usage
//!
//! ```ignore
//! let service = QueryService::new(manager, PlannerSettings::DEFAULT, ServiceSettings::DEFAULT)?;
//! let ticket = service.submit(PathRequest::new(start, goal), QueryPriority::High);
//! // ... later
//! if let Some(result) = ticket.try_result() {
//!     follow(result.waypoints());
//! }
//! ```

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, Sender};
use serde::Deserialize;
use web_time::Instant;

use crate::error::{NavError, NavResult};
use crate::metrics::{LoadSnapshot, QueryMetrics};
use crate::planner::{plan_path, CancelToken, PathRequest, PathResult, PlannerSettings};
use crate::update::UpdateManager;

// =============================================================================
// Settings
// =============================================================================

/// Scheduler limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
	/// Maximum queries running at once.
	pub max_concurrent: usize,
}

impl ServiceSettings {
	pub const DEFAULT: Self = Self { max_concurrent: 8 };

	/// One query at a time, in strict priority order.
	pub const SERIAL: Self = Self { max_concurrent: 1 };

	/// Check if another query may start.
	#[inline]
	pub fn can_start(&self, active: usize) -> bool {
		active < self.max_concurrent
	}

	pub fn validate(&self) -> NavResult<()> {
		if self.max_concurrent == 0 {
			return Err(NavError::InvalidConfig("max_concurrent must be at least 1".into()));
		}
		Ok(())
	}
}

impl Default for ServiceSettings {
	fn default() -> Self {
		Self::DEFAULT
	}
}

// =============================================================================
// Tickets
// =============================================================================

/// Scheduling priority. Within one priority, queries run in submission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPriority {
	Critical,
	High,
	#[default]
	Normal,
	Low,
}

impl QueryPriority {
	#[inline]
	fn rank(self) -> u8 {
		match self {
			Self::Critical => 3,
			Self::High => 2,
			Self::Normal => 1,
			Self::Low => 0,
		}
	}
}

/// Unique identifier for a submitted query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TicketId(u64);

impl TicketId {
	fn next() -> Self {
		static COUNTER: AtomicU64 = AtomicU64::new(1);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}

	pub fn raw(&self) -> u64 {
		self.0
	}
}

/// Handle to a submitted query.
pub struct PathTicket {
	id: TicketId,
	receiver: Receiver<PathResult>,
	service: Weak<Shared>,
	cancel: CancelToken,
}

impl PathTicket {
	pub fn id(&self) -> TicketId {
		self.id
	}

	/// Block until the query finishes.
	pub fn wait(&self) -> PathResult {
		self.receiver.recv().unwrap_or_else(|_| dropped())
	}

	/// Block for at most `timeout`.
	pub fn wait_timeout(&self, timeout: Duration) -> Option<PathResult> {
		match self.receiver.recv_timeout(timeout) {
			Ok(result) => Some(result),
			Err(RecvTimeoutError::Timeout) => None,
			Err(RecvTimeoutError::Disconnected) => Some(dropped()),
		}
	}

	/// Poll (non-blocking).
	pub fn try_result(&self) -> Option<PathResult> {
		self.receiver.try_recv().ok()
	}

	/// Cancel this query. A query still in the queue completes immediately.
	pub fn cancel(&self) {
		match self.service.upgrade() {
			Some(shared) => {
				shared.cancel(self.id);
			}
			None => self.cancel.cancel(),
		}
	}
}

/// Result for a query whose job disappeared without answering.
fn dropped() -> PathResult {
	PathResult::from_outcome(Err(NavError::Cancelled), 0)
}

// =============================================================================
// Scheduler
// =============================================================================

struct Job {
	id: TicketId,
	priority: QueryPriority,
	seq: u64,
	request: PathRequest,
	cancel: CancelToken,
	sender: Sender<PathResult>,
}

impl PartialEq for Job {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == CmpOrdering::Equal
	}
}

impl Eq for Job {}

impl PartialOrd for Job {
	fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
		Some(self.cmp(other))
	}
}

impl Ord for Job {
	// Higher priority first, then earlier submission.
	fn cmp(&self, other: &Self) -> CmpOrdering {
		self
			.priority
			.rank()
			.cmp(&other.priority.rank())
			.then_with(|| other.seq.cmp(&self.seq))
	}
}

#[derive(Default)]
struct Queue {
	jobs: BinaryHeap<Job>,
	/// Cancel tokens of every queued or running query.
	tokens: HashMap<TicketId, CancelToken>,
	paused: bool,
	next_seq: u64,
	dispatched: u64,
	active: usize,
	peak_active: usize,
}

struct Shared {
	manager: Arc<UpdateManager>,
	planner: PlannerSettings,
	settings: ServiceSettings,
	queue: Mutex<Queue>,
	metrics: QueryMetrics,
}

impl Shared {
	fn lock(&self) -> MutexGuard<'_, Queue> {
		self.queue.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn cancel(&self, id: TicketId) -> bool {
		let mut queue = self.lock();
		let Some(token) = queue.tokens.remove(&id) else {
			return false;
		};
		token.cancel();

		let (hit, keep): (Vec<Job>, Vec<Job>) = std::mem::take(&mut queue.jobs)
			.into_vec()
			.into_iter()
			.partition(|job| job.id == id);
		queue.jobs = keep.into();
		for job in hit {
			self.metrics.on_dropped();
			let _ = job.sender.send(dropped());
		}
		true
	}
}

/// Start queued jobs until the concurrency cap is reached.
fn pump(shared: &Arc<Shared>) {
	let mut queue = shared.lock();
	while !queue.paused && shared.settings.can_start(queue.active) {
		let Some(job) = queue.jobs.pop() else {
			break;
		};
		queue.active += 1;
		queue.peak_active = queue.peak_active.max(queue.active);
		queue.dispatched += 1;
		let order = queue.dispatched;
		shared.metrics.on_started();

		let snapshot = shared.manager.snapshot();
		let worker = Arc::clone(shared);
		rayon::spawn(move || {
			let started = Instant::now();
			let outcome = plan_path(&snapshot, &job.request, &worker.planner, &job.cancel);
			let result = PathResult::from_outcome(outcome, order);
			worker
				.metrics
				.on_finished(result.status, started.elapsed().as_micros() as u64);
			{
				let mut queue = worker.lock();
				queue.active -= 1;
				queue.tokens.remove(&job.id);
			}
			// Ignore send error (ticket dropped)
			let _ = job.sender.send(result);
			pump(&worker);
		});
	}
}

/// Front end for synchronous and asynchronous path queries.
pub struct QueryService {
	shared: Arc<Shared>,
}

impl QueryService {
	pub fn new(
		manager: Arc<UpdateManager>,
		planner: PlannerSettings,
		settings: ServiceSettings,
	) -> NavResult<Self> {
		planner.validate()?;
		settings.validate()?;
		Ok(Self {
			shared: Arc::new(Shared {
				manager,
				planner,
				settings,
				queue: Mutex::new(Queue::default()),
				metrics: QueryMetrics::new(),
			}),
		})
	}

	pub fn manager(&self) -> &Arc<UpdateManager> {
		&self.shared.manager
	}

	pub fn planner_settings(&self) -> &PlannerSettings {
		&self.shared.planner
	}

	/// Plan on the caller's thread against the live snapshot.
	///
	/// Planning outcomes, including NoPath and InvalidEndpoint, come back as a
	/// `PathResult`. Only a request the planner refuses to run is an `Err`.
	pub fn find_path(&self, request: &PathRequest) -> NavResult<PathResult> {
		let snapshot = self.shared.manager.snapshot();
		match plan_path(&snapshot, request, &self.shared.planner, &CancelToken::new()) {
			Err(err @ NavError::InvalidConfig(_)) => Err(err),
			outcome => Ok(PathResult::from_outcome(outcome, 0)),
		}
	}

	/// Queue a query. Returns immediately.
	pub fn submit(&self, request: PathRequest, priority: QueryPriority) -> PathTicket {
		let id = TicketId::next();
		let cancel = CancelToken::new();
		let (sender, receiver) = channel::bounded(1);
		{
			let mut queue = self.shared.lock();
			let seq = queue.next_seq;
			queue.next_seq += 1;
			queue.tokens.insert(id, cancel.clone());
			queue.jobs.push(Job {
				id,
				priority,
				seq,
				request,
				cancel: cancel.clone(),
				sender,
			});
		}
		self.shared.metrics.on_queued();
		tracing::trace!(ticket = id.raw(), ?priority, "query submitted");
		pump(&self.shared);

		PathTicket {
			id,
			receiver,
			service: Arc::downgrade(&self.shared),
			cancel,
		}
	}

	/// Cancel a query by id. Returns false if it already finished or never existed.
	pub fn cancel(&self, id: TicketId) -> bool {
		self.shared.cancel(id)
	}

	/// Stop dispatching. Running queries continue; new ones wait in the queue.
	pub fn pause(&self) {
		self.shared.lock().paused = true;
	}

	/// Resume dispatching.
	pub fn resume(&self) {
		self.shared.lock().paused = false;
		pump(&self.shared);
	}

	/// Current load counters.
	pub fn load(&self) -> LoadSnapshot {
		self.shared.metrics.snapshot()
	}

	/// Most queries that ever ran at once.
	pub fn peak_concurrency(&self) -> usize {
		self.shared.lock().peak_active
	}
}

#[cfg(test)]
#[path = "service_test.rs"]
mod service_test;
