//! Per-client admission control with background eviction of idle visitors.
//!
//! Every inbound request looks up (or lazily creates) the [`TokenBucket`] for its client key and
//! tries to take one token. The visitor map sits behind a read-write lock: the hot path only
//! takes the read lock for known clients, while first-seen clients and the sweep take the write
//! lock. Bucket mutation is serialized by the bucket's own mutex, so two concurrent requests from
//! the same client never both consume the same token.

mod bucket;

pub use bucket::*;

// self
use crate::{
	_prelude::*,
	clock::{self, Clock},
	obs::{self, AuthMetrics, Component, Event},
	task::BackgroundTask,
};

/// Bookkeeping for one client key.
#[derive(Debug)]
pub struct Visitor {
	bucket: TokenBucket,
	last_seen: Mutex<OffsetDateTime>,
}
impl Visitor {
	fn new(bucket: TokenBucket, now: OffsetDateTime) -> Self {
		Self { bucket, last_seen: Mutex::new(now) }
	}

	/// Shared handle to the visitor's bucket.
	pub fn bucket(&self) -> &TokenBucket {
		&self.bucket
	}

	/// Instant of the most recent request.
	pub fn last_seen(&self) -> OffsetDateTime {
		*self.last_seen.lock()
	}

	fn touch(&self, now: OffsetDateTime) {
		let mut last_seen = self.last_seen.lock();

		if now > *last_seen {
			*last_seen = now;
		}
	}
}

/// Keyed collection of token buckets.
pub struct RateLimiter {
	quota: Quota,
	visitors: RwLock<HashMap<String, Visitor>>,
	clock: Arc<dyn Clock>,
	metrics: Arc<AuthMetrics>,
}
impl RateLimiter {
	/// Creates an empty limiter handing out buckets with `quota`.
	pub fn new(quota: Quota) -> Self {
		Self {
			quota,
			visitors: Default::default(),
			clock: clock::system(),
			metrics: Default::default(),
		}
	}

	/// Replaces the clock used for refills and idle tracking.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Shares an external metrics handle.
	pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
		self.metrics = metrics;

		self
	}

	/// Quota applied to new visitors.
	pub fn quota(&self) -> Quota {
		self.quota
	}

	/// Returns the bucket for `key`, creating a full one on first sight, and refreshes the
	/// visitor's last-seen instant.
	pub fn get_visitor(&self, key: &str) -> TokenBucket {
		let now = self.clock.now();

		{
			let visitors = self.visitors.read();

			if let Some(visitor) = visitors.get(key) {
				visitor.touch(now);

				return visitor.bucket.clone();
			}
		}

		let mut visitors = self.visitors.write();
		// Another request may have inserted the key between the two lock acquisitions.
		let visitor = visitors
			.entry(key.to_owned())
			.or_insert_with(|| Visitor::new(TokenBucket::new(self.quota, self.clock.clone()), now));

		visitor.touch(now);

		visitor.bucket.clone()
	}

	/// Admission decision for one request from `key`.
	pub fn allow(&self, key: &str) -> bool {
		let admitted = self.get_visitor(key).allow();

		if admitted {
			self.metrics.record(Component::RateLimiter, Event::RequestAdmitted);
		} else {
			self.metrics.record(Component::RateLimiter, Event::RequestThrottled);
			obs::log_rejection(Component::RateLimiter, &"too many requests");
		}

		admitted
	}

	/// Number of tracked visitors.
	pub fn len(&self) -> usize {
		self.visitors.read().len()
	}

	/// Returns true if no visitor is tracked.
	pub fn is_empty(&self) -> bool {
		self.visitors.read().is_empty()
	}

	/// Returns true if `key` is currently tracked.
	pub fn contains(&self, key: &str) -> bool {
		self.visitors.read().contains_key(key)
	}

	/// Evicts every visitor idle for longer than `expiry`; returns how many were removed.
	pub fn delete_stale(&self, expiry: Duration) -> usize {
		let now = self.clock.now();
		let mut visitors = self.visitors.write();
		let before = visitors.len();

		visitors.retain(|_, visitor| now - visitor.last_seen() <= expiry);

		let evicted = before - visitors.len();

		self.metrics.record_n(Component::RateLimiter, Event::VisitorEvicted, evicted as u64);

		evicted
	}

	/// Starts the background sweep that runs [`delete_stale`](Self::delete_stale) every
	/// `interval`. Stop it through the returned handle during shutdown.
	pub fn cleanup_visitors(
		self: &Arc<Self>,
		interval: Duration,
		expiry: Duration,
	) -> BackgroundTask {
		let limiter = self.clone();

		BackgroundTask::spawn_periodic(VISITOR_SWEEP, interval, move || {
			let limiter = limiter.clone();

			async move {
				let evicted = limiter.delete_stale(expiry);

				obs::log_sweep(VISITOR_SWEEP, evicted as u64);
			}
		})
	}
}

impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter")
			.field("quota", &self.quota)
			.field("visitors", &self.visitors.read().len())
			.finish()
	}
}

const VISITOR_SWEEP: &str = "rate_limiter.visitors";

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, clock::ManualClock, task::ShutdownOutcome};

	fn limiter(clock: &Arc<ManualClock>, quota: Quota) -> RateLimiter {
		RateLimiter::new(quota).with_clock(clock.clone())
	}

	#[test]
	fn first_request_admitted_then_throttled_until_refill() {
		let clock = manual_clock();
		let limiter = limiter(&clock, Quota::per(Duration::seconds(60), 1));

		assert!(limiter.allow("1.2.3.4"));
		assert!(!limiter.allow("1.2.3.4"));
		assert!(limiter.allow("5.6.7.8"), "Keys must not share budgets.");

		clock.advance(Duration::seconds(60));

		assert!(limiter.allow("1.2.3.4"));
	}

	#[test]
	fn get_visitor_returns_shared_bucket() {
		let clock = manual_clock();
		let limiter = limiter(&clock, Quota::per_minute(1));

		assert!(limiter.get_visitor("k").allow());
		assert!(!limiter.get_visitor("k").allow());
		assert_eq!(limiter.len(), 1);
	}

	#[test]
	fn stale_visitors_are_evicted() {
		let clock = manual_clock();
		let metrics = Arc::new(AuthMetrics::default());
		let limiter = limiter(&clock, Quota::per_minute(10)).with_metrics(metrics.clone());

		limiter.allow("old");
		clock.advance(Duration::minutes(2));
		limiter.allow("fresh");
		clock.advance(Duration::minutes(2));

		assert_eq!(limiter.delete_stale(Duration::minutes(3)), 1);
		assert!(!limiter.contains("old"));
		assert!(limiter.contains("fresh"));
		assert_eq!(metrics.count(Event::VisitorEvicted), 1);
	}

	#[test]
	fn requests_refresh_last_seen() {
		let clock = manual_clock();
		let limiter = limiter(&clock, Quota::per_minute(10));

		limiter.allow("steady");
		clock.advance(Duration::minutes(2));
		limiter.allow("steady");
		clock.advance(Duration::minutes(2));

		assert_eq!(limiter.delete_stale(Duration::minutes(3)), 0);
		assert!(limiter.contains("steady"));
	}

	#[test]
	fn debug_output_reports_quota_and_visitor_count() {
		let clock = manual_clock();
		let limiter = limiter(&clock, Quota::per_minute(3));

		limiter.allow("a");
		limiter.allow("b");

		let rendered = format!("{limiter:?}");

		assert!(rendered.starts_with("RateLimiter"));
		assert!(rendered.contains("visitors: 2"), "Unexpected debug output: {rendered}.");
		assert!(!rendered.contains("clock"));
	}

	#[test]
	fn concurrent_requests_on_one_key_never_share_a_token() {
		const BURST: usize = 5;
		const CALLERS: usize = 64;

		let clock = manual_clock();
		let limiter = limiter(&clock, Quota::per_minute(1).with_burst(BURST as u32));
		let admitted = std::sync::atomic::AtomicUsize::new(0);
		let barrier = std::sync::Barrier::new(CALLERS);

		std::thread::scope(|scope| {
			for _ in 0..CALLERS {
				scope.spawn(|| {
					barrier.wait();

					if limiter.allow("203.0.113.7") {
						admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
					}
				});
			}
		});

		assert_eq!(admitted.into_inner(), BURST);
		assert_eq!(limiter.len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn cleanup_task_sweeps_in_background() {
		let clock = manual_clock();
		let limiter = Arc::new(limiter(&clock, Quota::per_minute(10)));

		limiter.allow("a");
		limiter.allow("b");
		clock.advance(Duration::minutes(10));

		let task = limiter.cleanup_visitors(Duration::seconds(1), Duration::minutes(3));

		tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;

		assert!(limiter.is_empty());
		assert_eq!(task.stop(Duration::seconds(1)).await, ShutdownOutcome::Graceful);
	}
}
