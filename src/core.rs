//! Façade that owns every component built from one [`AuthConfig`].
//!
//! [`AuthCore`] holds named handles to the signer, the rate limiter, the recovery store, and the
//! Basic allow-list, shares a single [`AuthMetrics`] handle between them, and owns both background
//! sweeps. Guards for individual routes are derived from it on demand.

// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::{Role, ScopeSet, UserId},
	clock::{self, Clock},
	config::AuthConfig,
	error::ConfigError,
	flows::{AccountDirectory, PasswordRecovery},
	guard::{BasicAuthorizer, BearerAuthorizer, KeyStrategy, RateLimitGuard},
	limiter::RateLimiter,
	obs::AuthMetrics,
	recovery::RecoveryTokenStore,
	signer::{TokenError, TokenSigner},
	store::RecoveryRepository,
	task::{BackgroundTask, ShutdownOutcome},
};

/// Every authentication component of a service, wired from one configuration.
pub struct AuthCore {
	signer: Arc<TokenSigner>,
	limiter: Arc<RateLimiter>,
	recovery: Arc<RecoveryTokenStore>,
	basic: Arc<BasicAuthorizer>,
	key_strategy: KeyStrategy,
	trust_forwarded_headers: bool,
	cleanup_interval: Duration,
	visitor_expiry: Duration,
	sweep_interval: Duration,
	metrics: Arc<AuthMetrics>,
	tasks: Mutex<Vec<BackgroundTask>>,
}
impl AuthCore {
	/// Builds every component from `config` using the system clock.
	pub fn from_config(
		config: &AuthConfig,
		repository: Arc<dyn RecoveryRepository>,
	) -> Result<Self, ConfigError> {
		Self::from_config_with_clock(config, repository, clock::system())
	}

	/// Builds every component from `config`, driving all time decisions from `clock`.
	pub fn from_config_with_clock(
		config: &AuthConfig,
		repository: Arc<dyn RecoveryRepository>,
		clock: Arc<dyn Clock>,
	) -> Result<Self, ConfigError> {
		let metrics = Arc::new(AuthMetrics::default());
		let signer = TokenSigner::new(config.token.signer_config()?)
			.with_clock(clock.clone())
			.with_metrics(metrics.clone());
		let limiter = RateLimiter::new(config.rate_limit.quota()?)
			.with_clock(clock.clone())
			.with_metrics(metrics.clone());
		let recovery = RecoveryTokenStore::new(repository, config.recovery.ttl()?)
			.with_clock(clock)
			.with_metrics(metrics.clone());
		let basic = config.basic.authorizer()?.with_metrics(metrics.clone());

		Ok(Self {
			signer: Arc::new(signer),
			limiter: Arc::new(limiter),
			recovery: Arc::new(recovery),
			basic: Arc::new(basic),
			key_strategy: config.rate_limit.key,
			trust_forwarded_headers: config.rate_limit.trust_forwarded_headers,
			cleanup_interval: config.rate_limit.cleanup_interval()?,
			visitor_expiry: config.rate_limit.visitor_expiry()?,
			sweep_interval: config.recovery.sweep_interval()?,
			metrics,
			tasks: Mutex::new(Vec::new()),
		})
	}

	/// Shared token signer.
	pub fn signer(&self) -> &Arc<TokenSigner> {
		&self.signer
	}

	/// Shared rate limiter.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Shared recovery-token store.
	pub fn recovery(&self) -> &Arc<RecoveryTokenStore> {
		&self.recovery
	}

	/// Basic-credential guard for the configured allow-list.
	pub fn basic(&self) -> Arc<BasicAuthorizer> {
		self.basic.clone()
	}

	/// Counters shared by every component.
	pub fn metrics(&self) -> &Arc<AuthMetrics> {
		&self.metrics
	}

	/// Bearer guard admitting `roles`; an empty set admits any verified token.
	pub fn bearer<I>(&self, roles: I) -> Arc<BearerAuthorizer>
	where
		I: IntoIterator<Item = Role>,
	{
		Arc::new(BearerAuthorizer::new(self.signer.clone(), roles).with_metrics(self.metrics.clone()))
	}

	/// Rate-limit guard using the configured key strategy and proxy trust.
	pub fn rate_limit_guard(&self) -> Arc<RateLimitGuard> {
		Arc::new(
			RateLimitGuard::new(self.limiter.clone(), self.key_strategy)
				.with_trusted_forwarded_headers(self.trust_forwarded_headers),
		)
	}

	/// Password-recovery use case over `directory`.
	pub fn password_recovery(&self, directory: Arc<dyn AccountDirectory>) -> PasswordRecovery {
		PasswordRecovery::new(directory, self.recovery.clone())
	}

	/// Signs an access token for `subject` carrying `role` and `scope`.
	pub fn create_access_token(
		&self,
		subject: &UserId,
		role: Role,
		scope: ScopeSet,
	) -> Result<String, TokenError> {
		self.signer.sign(|claims| {
			claims.subject = subject.as_ref().to_owned();
			claims.role = role;
			claims.scope = scope;
		})
	}

	/// Spawns the visitor sweep and the recovery expiry sweep.
	///
	/// Must be called from within a tokio runtime. Calling it again while the sweeps run is a
	/// no-op.
	pub fn start(&self) {
		let mut tasks = self.tasks.lock();

		if !tasks.is_empty() {
			return;
		}

		tasks.push(self.limiter.cleanup_visitors(self.cleanup_interval, self.visitor_expiry));
		tasks.push(self.recovery.start_sweeper(Some(self.sweep_interval)));
	}

	/// Returns `true` while both sweeps are running.
	pub fn is_running(&self) -> bool {
		let tasks = self.tasks.lock();

		!tasks.is_empty() && tasks.iter().all(BackgroundTask::is_running)
	}

	/// Stops both sweeps, sharing one `deadline` between them, and reports how each ended.
	pub async fn shutdown(&self, deadline: Duration) -> Vec<(&'static str, ShutdownOutcome)> {
		let tasks = std::mem::take(&mut *self.tasks.lock());
		let until = Instant::now() + deadline.unsigned_abs();
		let mut outcomes = Vec::with_capacity(tasks.len());

		for task in tasks {
			let remaining = Duration::try_from(until.saturating_duration_since(Instant::now()))
				.unwrap_or(Duration::ZERO);

			outcomes.push((task.name(), task.stop(remaining).await));
		}

		outcomes
	}
}
impl Debug for AuthCore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthCore")
			.field("key_strategy", &self.key_strategy)
			.field("trust_forwarded_headers", &self.trust_forwarded_headers)
			.field("cleanup_interval", &self.cleanup_interval)
			.field("visitor_expiry", &self.visitor_expiry)
			.field("sweep_interval", &self.sweep_interval)
			.field("tasks", &self.tasks.lock().len())
			.finish()
	}
}
