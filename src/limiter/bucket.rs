//! Token bucket with exact integer accounting.
//!
//! The bucket stores its budget as a duration: one token is worth one emission interval, and the
//! budget refills one-for-one with elapsed time up to `interval * burst`. This keeps refill exact
//! (no floating-point drift), so a `1 per 60s` bucket is admitting again after precisely 60s.

// self
use crate::{_prelude::*, clock::Clock};

/// Refill rate and burst capacity for a [`TokenBucket`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quota {
	interval: Duration,
	burst: u32,
}
impl Quota {
	/// Allows `requests` per `period` with a burst of one.
	///
	/// Zero requests count as one; the refill interval never drops below one nanosecond.
	pub fn per(period: Duration, requests: u32) -> Self {
		let interval = period / requests.max(1);

		Self { interval: interval.max(Duration::NANOSECOND), burst: 1 }
	}

	/// Allows `requests` per second.
	pub fn per_second(requests: u32) -> Self {
		Self::per(Duration::SECOND, requests)
	}

	/// Allows `requests` per minute.
	pub fn per_minute(requests: u32) -> Self {
		Self::per(Duration::MINUTE, requests)
	}

	/// Overrides the burst capacity (minimum one).
	pub fn with_burst(mut self, burst: u32) -> Self {
		self.burst = burst.max(1);

		self
	}

	/// Time it takes to refill one token.
	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Maximum number of tokens the bucket holds.
	pub fn burst(&self) -> u32 {
		self.burst
	}

	fn capacity(&self) -> Duration {
		self.interval * self.burst
	}
}

/// Shared handle to one client's token bucket; clones observe the same budget.
#[derive(Clone)]
pub struct TokenBucket {
	quota: Quota,
	clock: Arc<dyn Clock>,
	state: Arc<Mutex<BucketState>>,
}
impl TokenBucket {
	/// Creates a full bucket.
	pub fn new(quota: Quota, clock: Arc<dyn Clock>) -> Self {
		let state = BucketState { budget: quota.capacity(), updated_at: clock.now() };

		Self { quota, clock, state: Arc::new(Mutex::new(state)) }
	}

	/// Consumes one token if available. Never blocks or queues.
	pub fn allow(&self) -> bool {
		let now = self.clock.now();
		let mut state = self.state.lock();

		state.refill(now, &self.quota);

		if state.budget < self.quota.interval {
			return false;
		}

		state.budget -= self.quota.interval;

		true
	}

	/// Whole tokens currently available.
	pub fn tokens(&self) -> u32 {
		let now = self.clock.now();
		let mut state = self.state.lock();

		state.refill(now, &self.quota);

		let whole = state.budget.whole_nanoseconds() / self.quota.interval.whole_nanoseconds();

		u32::try_from(whole).unwrap_or(u32::MAX)
	}

	/// Quota the bucket was created with.
	pub fn quota(&self) -> Quota {
		self.quota
	}
}
impl Debug for TokenBucket {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBucket")
			.field("quota", &self.quota)
			.field("budget", &self.state.lock().budget)
			.finish()
	}
}

struct BucketState {
	budget: Duration,
	updated_at: OffsetDateTime,
}
impl BucketState {
	fn refill(&mut self, now: OffsetDateTime, quota: &Quota) {
		let elapsed = now - self.updated_at;

		// Clocks that step backwards leave the budget untouched.
		if elapsed.is_positive() {
			self.budget = (self.budget + elapsed).min(quota.capacity());
			self.updated_at = now;
		}
	}
}
