//! Per-identity fixed-window request counting.
//!
//! One entry per identity holds the start of its current window and the
//! number of requests admitted in it. The check-and-update of an entry runs
//! under the shard lock of the map, and so does the sweep, so a window is
//! never removed while a request is updating it.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Counter state of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
	/// Requests admitted in the current window.
	pub count: u32,
	/// Start of the current window, unix milliseconds.
	pub window_start_ms: i64,
}

/// Budget of an identity at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
	pub limit: u32,
	pub remaining: u32,
	/// When the current window ends, unix milliseconds.
	pub reset_at_ms: i64,
}

impl RateLimitStatus {
	/// Whole seconds until the window resets, at least one.
	pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
		let wait_ms = (self.reset_at_ms - now_ms).max(0) as u64;
		wait_ms.div_ceil(1000).max(1)
	}
}

/// Result of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
	Allowed(RateLimitStatus),
	Limited(RateLimitStatus),
}

impl RateLimitDecision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, RateLimitDecision::Allowed(_))
	}

	pub fn status(&self) -> RateLimitStatus {
		match self {
			RateLimitDecision::Allowed(status) | RateLimitDecision::Limited(status) => *status,
		}
	}
}

/// Process-wide table of rate limit windows.
#[derive(Debug)]
pub struct RateLimitStore {
	entries: DashMap<String, RateLimitEntry>,
	window_ms: i64,
	max_requests: u32,
}

/// Current wall clock in unix milliseconds.
pub fn now_ms() -> i64 {
	chrono::Utc::now().timestamp_millis()
}

impl RateLimitStore {
	pub fn new(window_ms: u64, max_requests: u32) -> Self {
		Self {
			entries: DashMap::new(),
			window_ms: i64::try_from(window_ms).unwrap_or(i64::MAX),
			max_requests,
		}
	}

	pub fn limit(&self) -> u32 {
		self.max_requests
	}

	/// Counts a request from `identity` now.
	pub fn check(&self, identity: &str) -> RateLimitDecision {
		self.check_at(identity, now_ms())
	}

	/// Counts a request from `identity` at `now_ms`.
	///
	/// A request past the end of the identity's window opens a new window
	/// with a count of one.
	pub fn check_at(&self, identity: &str, now_ms: i64) -> RateLimitDecision {
		let mut entry = self
			.entries
			.entry(identity.to_string())
			.or_insert(RateLimitEntry {
				count: 0,
				window_start_ms: now_ms,
			});

		if entry.count == 0 || self.expired(&entry, now_ms) {
			*entry = RateLimitEntry {
				count: 1,
				window_start_ms: now_ms,
			};
			return RateLimitDecision::Allowed(self.status_of(&entry));
		}

		if entry.count >= self.max_requests {
			return RateLimitDecision::Limited(self.status_of(&entry));
		}

		entry.count += 1;
		RateLimitDecision::Allowed(self.status_of(&entry))
	}

	/// Budget of `identity` without counting a request.
	pub fn status(&self, identity: &str) -> RateLimitStatus {
		self.status_at(identity, now_ms())
	}

	pub fn status_at(&self, identity: &str, now_ms: i64) -> RateLimitStatus {
		match self.entries.get(identity) {
			Some(entry) if !self.expired(&entry, now_ms) => self.status_of(&entry),
			_ => RateLimitStatus {
				limit: self.max_requests,
				remaining: self.max_requests,
				reset_at_ms: now_ms.saturating_add(self.window_ms),
			},
		}
	}

	/// Removes every expired window, returning how many were dropped.
	pub fn sweep(&self) -> usize {
		self.sweep_at(now_ms())
	}

	pub fn sweep_at(&self, now_ms: i64) -> usize {
		let before = self.entries.len();
		self.entries.retain(|_, entry| !self.expired(entry, now_ms));
		before.saturating_sub(self.entries.len())
	}

	/// Number of tracked identities.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Starts the periodic sweep on the current tokio runtime.
	pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> RateLimitSweeper {
		let store = Arc::clone(self);
		let handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			// The first tick completes immediately.
			ticker.tick().await;
			loop {
				ticker.tick().await;
				let removed = store.sweep();
				if removed > 0 {
					debug!(removed, remaining = store.len(), "Swept expired rate limit windows");
				}
			}
		});
		RateLimitSweeper { handle }
	}

	fn expired(&self, entry: &RateLimitEntry, now_ms: i64) -> bool {
		now_ms.saturating_sub(entry.window_start_ms) > self.window_ms
	}

	fn status_of(&self, entry: &RateLimitEntry) -> RateLimitStatus {
		RateLimitStatus {
			limit: self.max_requests,
			remaining: self.max_requests.saturating_sub(entry.count),
			reset_at_ms: entry.window_start_ms.saturating_add(self.window_ms),
		}
	}
}

/// Handle of the background sweep task; the task stops when this is dropped.
#[derive(Debug)]
pub struct RateLimitSweeper {
	handle: JoinHandle<()>,
}

impl RateLimitSweeper {
	/// Stops the sweep task.
	pub fn shutdown(self) {
		drop(self);
	}

	pub fn is_running(&self) -> bool {
		!self.handle.is_finished()
	}
}

impl Drop for RateLimitSweeper {
	fn drop(&mut self) {
		self.handle.abort();
	}
}
