//! Observability helpers shared by every component.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured events and spans named `microauth.op` with the
//!   `component` and `op` fields.
//! - Enable `metrics` to increment the `microauth_events_total` counter, labeled by `component` and
//!   `event`.
//!
//! Independently of the features, every component records into an explicit [`AuthMetrics`]
//! handle supplied at construction time.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Components observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Component {
	/// Bearer token signer/verifier.
	Signer,
	/// Bearer authorization guard.
	Bearer,
	/// Basic credential guard.
	Basic,
	/// Per-client rate limiter.
	RateLimiter,
	/// Recovery token store.
	Recovery,
}
impl Component {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Component::Signer => "signer",
			Component::Bearer => "bearer",
			Component::Basic => "basic",
			Component::RateLimiter => "rate_limiter",
			Component::Recovery => "recovery",
		}
	}
}
impl Display for Component {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Countable events recorded by [`AuthMetrics`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
	/// A bearer token was signed.
	TokenSigned,
	/// A bearer token passed verification.
	TokenVerified,
	/// A bearer token failed verification.
	TokenRejected,
	/// A request passed an authorization guard.
	AuthGranted,
	/// A request was rejected by an authorization guard.
	AuthDenied,
	/// A request was admitted by the rate limiter.
	RequestAdmitted,
	/// A request was throttled by the rate limiter.
	RequestThrottled,
	/// Idle visitors evicted by a limiter sweep.
	VisitorEvicted,
	/// A recovery token was issued.
	RecoveryIssued,
	/// A recovery token was redeemed.
	RecoveryConsumed,
	/// A recovery token redemption was refused (unknown or expired).
	RecoveryRejected,
	/// Expired recovery records deleted by a sweep.
	RecoverySwept,
	/// A sweep iteration failed.
	SweepFailed,
}
impl Event {
	/// Number of distinct events.
	pub const COUNT: usize = 13;

	/// Returns a stable label suitable for metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Event::TokenSigned => "token_signed",
			Event::TokenVerified => "token_verified",
			Event::TokenRejected => "token_rejected",
			Event::AuthGranted => "auth_granted",
			Event::AuthDenied => "auth_denied",
			Event::RequestAdmitted => "request_admitted",
			Event::RequestThrottled => "request_throttled",
			Event::VisitorEvicted => "visitor_evicted",
			Event::RecoveryIssued => "recovery_issued",
			Event::RecoveryConsumed => "recovery_consumed",
			Event::RecoveryRejected => "recovery_rejected",
			Event::RecoverySwept => "recovery_swept",
			Event::SweepFailed => "sweep_failed",
		}
	}

	const fn index(self) -> usize {
		self as usize
	}
}
impl Display for Event {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
