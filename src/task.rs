//! Cancellable periodic background tasks shared by the visitor and recovery sweeps.
//!
//! A task runs one tick per period until cancelled. Each tick executes on its own tokio task so a
//! panicking iteration is logged and the loop continues with the next tick.
//! [`BackgroundTask::stop`] cancels the loop and waits for it to exit, giving up once the
//! caller's deadline elapses.

// crates.io
use tokio::{
	task::JoinHandle,
	time::{self as tokio_time, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, obs};

const MIN_PERIOD: std::time::Duration = std::time::Duration::from_millis(1);

/// How a [`BackgroundTask::stop`] call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
	/// The task acknowledged cancellation before the deadline.
	Graceful,
	/// The deadline elapsed first; the task was abandoned.
	Forced,
	/// An earlier call already stopped the task.
	AlreadyStopped,
}

/// Handle to a periodic task running on the tokio runtime.
///
/// Dropping the handle cancels the task without waiting for it.
pub struct BackgroundTask {
	name: &'static str,
	cancel: CancellationToken,
	handle: Mutex<Option<JoinHandle<()>>>,
}
impl BackgroundTask {
	/// Spawns `tick` every `period` until stopped.
	///
	/// Must be called from within a tokio runtime.
	pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, tick: F) -> Self
	where
		F: 'static + Send + FnMut() -> Fut,
		Fut: 'static + Send + Future<Output = ()>,
	{
		Self::spawn_periodic_with_token(name, period, &CancellationToken::new(), tick)
	}

	/// Like [`spawn_periodic`](Self::spawn_periodic), but also stops when `parent` is cancelled.
	pub fn spawn_periodic_with_token<F, Fut>(
		name: &'static str,
		period: Duration,
		parent: &CancellationToken,
		mut tick: F,
	) -> Self
	where
		F: 'static + Send + FnMut() -> Fut,
		Fut: 'static + Send + Future<Output = ()>,
	{
		let cancel = parent.child_token();
		let token = cancel.clone();
		let period = period.unsigned_abs().max(MIN_PERIOD);
		let handle = tokio::spawn(async move {
			let mut ticker = tokio_time::interval_at(Instant::now() + period, period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					biased;
					_ = token.cancelled() => break,
					_ = ticker.tick() => {
						if let Err(e) = tokio::spawn(tick()).await {
							obs::log_sweep_failure(name, &e);
						}
					},
				}
			}
		});

		Self { name, cancel, handle: Mutex::new(Some(handle)) }
	}

	/// Name used in log records.
	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Returns `true` until the task has been stopped or cancelled.
	pub fn is_running(&self) -> bool {
		!self.cancel.is_cancelled() && self.handle.lock().as_ref().is_some_and(|h| !h.is_finished())
	}

	/// Signals cancellation and waits up to `deadline` for the task to exit.
	///
	/// A forced stop is logged, not reported as an error.
	pub async fn stop(&self, deadline: Duration) -> ShutdownOutcome {
		self.cancel.cancel();

		let Some(handle) = self.handle.lock().take() else {
			return ShutdownOutcome::AlreadyStopped;
		};
		let graceful = tokio_time::timeout(deadline.unsigned_abs(), handle).await.is_ok();

		obs::log_shutdown(self.name, graceful);

		if graceful { ShutdownOutcome::Graceful } else { ShutdownOutcome::Forced }
	}
}
impl Drop for BackgroundTask {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}
impl Debug for BackgroundTask {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BackgroundTask")
			.field("name", &self.name)
			.field("cancelled", &self.cancel.is_cancelled())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use super::*;

	fn counting_task(period: Duration) -> (BackgroundTask, Arc<AtomicU32>) {
		let ticks = Arc::new(AtomicU32::new(0));
		let seen = ticks.clone();
		let task = BackgroundTask::spawn_periodic("counter", period, move || {
			let seen = seen.clone();

			async move {
				seen.fetch_add(1, Ordering::SeqCst);
			}
		});

		(task, ticks)
	}

	#[tokio::test(start_paused = true)]
	async fn ticks_until_stopped() {
		let (task, ticks) = counting_task(Duration::seconds(10));

		tokio_time::sleep(std::time::Duration::from_secs(35)).await;

		assert_eq!(ticks.load(Ordering::SeqCst), 3);
		assert!(task.is_running());
		assert_eq!(task.stop(Duration::seconds(1)).await, ShutdownOutcome::Graceful);
		assert!(!task.is_running());

		tokio_time::sleep(std::time::Duration::from_secs(60)).await;

		assert_eq!(ticks.load(Ordering::SeqCst), 3, "No ticks may run after stop.");
		assert_eq!(task.stop(Duration::seconds(1)).await, ShutdownOutcome::AlreadyStopped);
	}

	#[tokio::test(start_paused = true)]
	async fn panicking_tick_does_not_end_the_loop() {
		let ticks = Arc::new(AtomicU32::new(0));
		let seen = ticks.clone();
		let task = BackgroundTask::spawn_periodic("flaky", Duration::seconds(1), move || {
			let n = seen.fetch_add(1, Ordering::SeqCst);

			async move {
				if n == 0 {
					panic!("first sweep blew up");
				}
			}
		});

		tokio_time::sleep(std::time::Duration::from_millis(3_500)).await;

		assert_eq!(ticks.load(Ordering::SeqCst), 3);
		assert_eq!(task.stop(Duration::seconds(1)).await, ShutdownOutcome::Graceful);
	}

	#[tokio::test(start_paused = true)]
	async fn slow_tick_forces_shutdown_after_deadline() {
		let task = BackgroundTask::spawn_periodic("slow", Duration::seconds(1), || async {
			tokio_time::sleep(std::time::Duration::from_secs(600)).await;
		});

		tokio_time::sleep(std::time::Duration::from_millis(1_500)).await;

		assert_eq!(task.stop(Duration::seconds(2)).await, ShutdownOutcome::Forced);
	}

	#[tokio::test(start_paused = true)]
	async fn parent_token_cancels_children() {
		let parent = CancellationToken::new();
		let task =
			BackgroundTask::spawn_periodic_with_token("child", Duration::seconds(1), &parent, || async {});

		parent.cancel();

		assert!(!task.is_running());
		assert_eq!(task.stop(Duration::seconds(1)).await, ShutdownOutcome::Graceful);
	}
}
