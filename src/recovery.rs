//! One-time password-recovery tokens.
//!
//! A token is handed out in plaintext exactly once by [`RecoveryTokenStore::issue_token`]; only
//! its SHA-256 digest reaches the repository. Redemption hashes the presented value, compares
//! digests in constant time, and deletes the record before returning the owner, so a token can
//! never be redeemed twice. Expired records are removed on a redemption attempt and by the
//! periodic sweep started with [`RecoveryTokenStore::start_sweeper`].

// self
use crate::{
	_prelude::*,
	auth::{self, TokenHash, TokenSecret, UserId},
	clock::{self, Clock},
	obs::{self, AuthMetrics, Component, Event, OpSpan},
	store::{RecoveryRecord, RecoveryRepository, StoreError},
	task::BackgroundTask,
};

/// Default recovery-token lifetime: ten minutes.
pub const DEFAULT_RECOVERY_TTL: Duration = Duration::minutes(10);

const RECOVERY_SWEEP: &str = "recovery.tokens";
const GENERIC_REJECTION: &str = "Invalid or expired request.";

/// Errors produced by the recovery-token lifecycle.
#[derive(Debug, ThisError)]
pub enum RecoveryError {
	/// No stored record matches the presented token.
	#[error("Recovery token not found.")]
	NotFound,
	/// The token outlived its TTL; the record has been removed.
	#[error("Recovery token expired.")]
	Expired,
	/// The recovery request could not be honored (e.g. unknown account).
	#[error("Recovery request is invalid.")]
	InvalidRequest,
	/// The new password and its confirmation differ.
	#[error("Password and confirmation do not match.")]
	InvalidPassword,
	/// The repository failed.
	#[error(transparent)]
	Persistence(#[from] StoreError),
}
impl RecoveryError {
	/// Client-visible message. Unknown accounts, unknown tokens, and expired tokens share one
	/// message so callers cannot enumerate users or probe token state.
	pub fn public_message(&self) -> &'static str {
		match self {
			RecoveryError::NotFound | RecoveryError::Expired | RecoveryError::InvalidRequest =>
				GENERIC_REJECTION,
			RecoveryError::InvalidPassword => "Password and confirmation do not match.",
			RecoveryError::Persistence(_) => "Internal error.",
		}
	}

	/// Returns `true` for failures caused by the caller's input rather than the backend.
	pub fn is_client_error(&self) -> bool {
		!matches!(self, RecoveryError::Persistence(_))
	}
}

/// Issues and redeems one-time recovery tokens against a [`RecoveryRepository`].
#[derive(Clone)]
pub struct RecoveryTokenStore {
	repository: Arc<dyn RecoveryRepository>,
	ttl: Duration,
	clock: Arc<dyn Clock>,
	metrics: Arc<AuthMetrics>,
}
impl RecoveryTokenStore {
	/// Creates a store whose tokens stay valid for `ttl`.
	pub fn new(repository: Arc<dyn RecoveryRepository>, ttl: Duration) -> Self {
		Self { repository, ttl, clock: clock::system(), metrics: Default::default() }
	}

	/// Replaces the clock used for issue stamps and expiry decisions.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Shares an external metrics handle.
	pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
		self.metrics = metrics;

		self
	}

	/// Token lifetime.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Interval the sweeper uses when none is configured: twice the TTL.
	pub fn default_sweep_interval(&self) -> Duration {
		self.ttl * 2
	}

	/// Generates a token for `user_id`, replacing any token the user already holds, and returns
	/// the plaintext. The plaintext is neither stored nor logged.
	pub async fn issue_token(&self, user_id: &UserId) -> Result<TokenSecret, RecoveryError> {
		OpSpan::new(Component::Recovery, "issue_token")
			.instrument(async move {
				let plaintext = auth::generate_token();
				let record = RecoveryRecord::new(
					user_id.clone(),
					TokenHash::of(plaintext.expose()),
					self.clock.now(),
				);

				self.repository.create_or_replace(record).await?;
				self.metrics.record(Component::Recovery, Event::RecoveryIssued);

				Ok(plaintext)
			})
			.await
	}

	/// Redeems `presented` under the store's TTL, returning the owning user.
	pub async fn consume_token(&self, presented: &str) -> Result<UserId, RecoveryError> {
		self.consume_token_with_ttl(presented, self.ttl).await
	}

	/// Redeems `presented` under an explicit `ttl`.
	///
	/// The record is deleted before the owner is returned. Of two concurrent redemptions of the
	/// same token, only the one whose delete removes the row succeeds; the other sees
	/// [`RecoveryError::NotFound`].
	pub async fn consume_token_with_ttl(
		&self,
		presented: &str,
		ttl: Duration,
	) -> Result<UserId, RecoveryError> {
		let result = OpSpan::new(Component::Recovery, "consume_token")
			.instrument(self.consume_inner(presented, ttl))
			.await;

		match &result {
			Ok(_) => self.metrics.record(Component::Recovery, Event::RecoveryConsumed),
			Err(e) if e.is_client_error() => {
				self.metrics.record(Component::Recovery, Event::RecoveryRejected);
				obs::log_rejection(Component::Recovery, e);
			},
			Err(_) => {},
		}

		result
	}

	async fn consume_inner(&self, presented: &str, ttl: Duration) -> Result<UserId, RecoveryError> {
		let hash = TokenHash::of(presented);
		let record = self
			.repository
			.find_by_hash(&hash)
			.await?
			.filter(|record| record.hash.ct_eq(&hash))
			.ok_or(RecoveryError::NotFound)?;

		if record.is_expired_at(ttl, self.clock.now()) {
			self.repository.delete_by_hash(&record.hash).await?;

			return Err(RecoveryError::Expired);
		}
		if !self.repository.delete_by_hash(&record.hash).await? {
			return Err(RecoveryError::NotFound);
		}

		Ok(record.user_id)
	}

	/// Deletes every record older than the TTL; returns how many were removed.
	pub async fn sweep_expired(&self) -> Result<u64, RecoveryError> {
		let cutoff = self.clock.now() - self.ttl;
		let removed = self.repository.delete_older_than(cutoff).await?;

		self.metrics.record_n(Component::Recovery, Event::RecoverySwept, removed);

		Ok(removed)
	}

	/// Starts the background expiry sweep, every `interval` or
	/// [`default_sweep_interval`](Self::default_sweep_interval) when `None`.
	///
	/// A failed pass is logged and counted; the next tick runs as scheduled.
	pub fn start_sweeper(self: &Arc<Self>, interval: Option<Duration>) -> BackgroundTask {
		let store = self.clone();
		let interval = interval.unwrap_or_else(|| self.default_sweep_interval());

		BackgroundTask::spawn_periodic(RECOVERY_SWEEP, interval, move || {
			let store = store.clone();

			async move {
				match store.sweep_expired().await {
					Ok(removed) => obs::log_sweep(RECOVERY_SWEEP, removed),
					Err(e) => {
						store.metrics.record(Component::Recovery, Event::SweepFailed);
						obs::log_sweep_failure(RECOVERY_SWEEP, &e);
					},
				}
			}
		})
	}
}
impl Debug for RecoveryTokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RecoveryTokenStore").field("ttl", &self.ttl).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		store::StoreFuture,
		task::ShutdownOutcome,
	};

	fn user(id: &str) -> UserId {
		UserId::new(id).expect("User fixture should be valid.")
	}

	#[tokio::test]
	async fn issued_token_is_redeemed_once() {
		let clock = manual_clock();
		let (store, repository) = build_test_recovery(clock.clone(), DEFAULT_RECOVERY_TTL);
		let plaintext = store.issue_token(&user("u1")).await.expect("Issue should succeed.");

		assert!(repository.contains_plaintext(plaintext.expose()));

		let owner = store.consume_token(plaintext.expose()).await.expect("Redeem should succeed.");

		assert_eq!(owner.as_ref(), "u1");
		assert!(repository.is_empty());
		assert!(matches!(
			store.consume_token(plaintext.expose()).await,
			Err(RecoveryError::NotFound)
		));
	}

	#[tokio::test]
	async fn stored_value_is_digest_of_plaintext() {
		let (store, repository) = build_test_recovery(manual_clock(), DEFAULT_RECOVERY_TTL);
		let plaintext = store.issue_token(&user("u1")).await.expect("Issue should succeed.");
		let records = repository.records();

		assert_eq!(records.len(), 1);
		assert_eq!(records[0].hash, TokenHash::of(plaintext.expose()));
		assert_ne!(records[0].hash.as_str(), plaintext.expose());
	}

	#[tokio::test]
	async fn token_valid_at_exact_ttl_then_expires() {
		let clock = manual_clock();
		let (store, _) = build_test_recovery(clock.clone(), DEFAULT_RECOVERY_TTL);
		let at_limit = store.issue_token(&user("u1")).await.expect("Issue should succeed.");

		clock.advance(DEFAULT_RECOVERY_TTL);

		assert!(store.consume_token(at_limit.expose()).await.is_ok());

		let late = store.issue_token(&user("u2")).await.expect("Issue should succeed.");

		clock.advance(DEFAULT_RECOVERY_TTL + Duration::SECOND);

		assert!(matches!(store.consume_token(late.expose()).await, Err(RecoveryError::Expired)));
		assert!(matches!(store.consume_token(late.expose()).await, Err(RecoveryError::NotFound)));
	}

	#[tokio::test]
	async fn reissue_invalidates_previous_token() {
		let (store, _) = build_test_recovery(manual_clock(), DEFAULT_RECOVERY_TTL);
		let first = store.issue_token(&user("u1")).await.expect("Issue should succeed.");
		let second = store.issue_token(&user("u1")).await.expect("Reissue should succeed.");

		assert_ne!(first.expose(), second.expose());
		assert!(matches!(store.consume_token(first.expose()).await, Err(RecoveryError::NotFound)));
		assert!(store.consume_token(second.expose()).await.is_ok());
	}

	#[tokio::test]
	async fn explicit_ttl_overrides_store_default() {
		let clock = manual_clock();
		let (store, _) = build_test_recovery(clock.clone(), DEFAULT_RECOVERY_TTL);
		let plaintext = store.issue_token(&user("u1")).await.expect("Issue should succeed.");

		clock.advance(Duration::minutes(2));

		assert!(matches!(
			store.consume_token_with_ttl(plaintext.expose(), Duration::minutes(1)).await,
			Err(RecoveryError::Expired)
		));
	}

	#[tokio::test]
	async fn sweep_removes_only_expired_records() {
		let clock = manual_clock();
		let metrics = Arc::new(AuthMetrics::default());
		let (store, repository) = build_test_recovery(clock.clone(), DEFAULT_RECOVERY_TTL);
		let store = store.with_metrics(metrics.clone());

		store.issue_token(&user("old")).await.expect("Issue should succeed.");
		clock.advance(Duration::minutes(8));

		let fresh = store.issue_token(&user("new")).await.expect("Issue should succeed.");

		clock.advance(Duration::minutes(5));

		assert_eq!(store.sweep_expired().await.expect("Sweep should succeed."), 1);
		assert_eq!(repository.len(), 1);
		assert!(repository.contains_plaintext(fresh.expose()));
		assert_eq!(metrics.count(Event::RecoverySwept), 1);
	}

	#[test]
	fn public_messages_do_not_distinguish_lookup_failures() {
		let not_found = RecoveryError::NotFound.public_message();

		assert_eq!(RecoveryError::Expired.public_message(), not_found);
		assert_eq!(RecoveryError::InvalidRequest.public_message(), not_found);
		assert!(!RecoveryError::Persistence(StoreError::Backend { message: "down".into() })
			.public_message()
			.contains("down"));
	}

	#[tokio::test(start_paused = true)]
	async fn sweeper_runs_every_two_ttls_by_default() {
		let clock = manual_clock();
		let (store, repository) = build_test_recovery(clock.clone(), Duration::seconds(10));
		let store = Arc::new(store);

		store.issue_token(&user("u1")).await.expect("Issue should succeed.");
		clock.advance(Duration::minutes(1));

		let task = store.start_sweeper(None);

		tokio::time::sleep(std::time::Duration::from_secs(19)).await;

		assert_eq!(repository.len(), 1, "No sweep may run before 2 * ttl.");

		tokio::time::sleep(std::time::Duration::from_secs(2)).await;

		assert!(repository.is_empty());
		assert_eq!(task.stop(Duration::seconds(1)).await, ShutdownOutcome::Graceful);
	}

	struct BrokenRepository;
	impl RecoveryRepository for BrokenRepository {
		fn create_or_replace(&self, _: RecoveryRecord) -> StoreFuture<'_, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "offline".into() }) })
		}

		fn find_by_hash<'a>(&'a self, _: &'a TokenHash) -> StoreFuture<'a, Option<RecoveryRecord>> {
			Box::pin(async { Err(StoreError::Backend { message: "offline".into() }) })
		}

		fn delete_by_hash<'a>(&'a self, _: &'a TokenHash) -> StoreFuture<'a, bool> {
			Box::pin(async { Err(StoreError::Backend { message: "offline".into() }) })
		}

		fn delete_older_than(&self, _: OffsetDateTime) -> StoreFuture<'_, u64> {
			Box::pin(async { Err(StoreError::Backend { message: "offline".into() }) })
		}
	}

	#[tokio::test(start_paused = true)]
	async fn backend_failures_surface_and_sweeper_survives() {
		let metrics = Arc::new(AuthMetrics::default());
		let store = Arc::new(
			RecoveryTokenStore::new(Arc::new(BrokenRepository), DEFAULT_RECOVERY_TTL)
				.with_metrics(metrics.clone()),
		);

		assert!(matches!(
			store.issue_token(&user("u1")).await,
			Err(RecoveryError::Persistence(StoreError::Backend { .. }))
		));

		let task = store.start_sweeper(Some(Duration::seconds(1)));

		tokio::time::sleep(std::time::Duration::from_millis(2_500)).await;

		assert_eq!(metrics.count(Event::SweepFailed), 2);
		assert!(task.is_running());
		assert_eq!(task.stop(Duration::seconds(1)).await, ShutdownOutcome::Graceful);
	}
}
