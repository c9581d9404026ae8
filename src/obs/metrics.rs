// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{Component, Event};

/// Thread-safe event counters handed to each component at construction time.
#[derive(Debug, Default)]
pub struct AuthMetrics {
	counts: [AtomicU64; Event::COUNT],
}
impl AuthMetrics {
	/// Returns how many times `event` has been recorded.
	pub fn count(&self, event: Event) -> u64 {
		self.counts[event.index()].load(Ordering::Relaxed)
	}

	pub(crate) fn record(&self, component: Component, event: Event) {
		self.record_n(component, event, 1);
	}

	pub(crate) fn record_n(&self, component: Component, event: Event, n: u64) {
		if n == 0 {
			return;
		}

		self.counts[event.index()].fetch_add(n, Ordering::Relaxed);

		#[cfg(feature = "metrics")]
		{
			metrics::counter!(
				"microauth_events_total",
				"component" => component.as_str(),
				"event" => event.as_str()
			)
			.increment(n);
		}
		#[cfg(not(feature = "metrics"))]
		{
			let _ = component;
		}
	}
}
