//! Rate-limit admission in front of business handlers.

// std
use std::net::IpAddr;
// self
use crate::{_prelude::*, limiter::RateLimiter};

/// Placeholder key part used when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// How a request is mapped onto a limiter key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
	/// One budget per client address across all routes.
	ClientIp,
	/// One budget per route and client address (`"{path}/{client_ip}"`).
	#[default]
	PathAndClientIp,
}

/// Admits or throttles requests through a shared [`RateLimiter`].
///
/// Forwarding headers are ignored unless the guard sits behind a declared reverse proxy; a
/// direct client could otherwise pick a fresh key, and a fresh budget, for every request.
#[derive(Clone, Debug)]
pub struct RateLimitGuard {
	limiter: Arc<RateLimiter>,
	strategy: KeyStrategy,
	trust_forwarded_headers: bool,
}
impl RateLimitGuard {
	/// Creates a guard keyed by `strategy` that identifies clients by their connection peer.
	pub fn new(limiter: Arc<RateLimiter>, strategy: KeyStrategy) -> Self {
		Self { limiter, strategy, trust_forwarded_headers: false }
	}

	/// Reads `X-Forwarded-For` and `X-Real-IP` before the connection peer.
	///
	/// Enable only when every request passes through a proxy that overwrites these headers.
	pub fn with_trusted_forwarded_headers(mut self, trust: bool) -> Self {
		self.trust_forwarded_headers = trust;

		self
	}

	/// Shared limiter behind the guard.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Active key strategy.
	pub fn strategy(&self) -> KeyStrategy {
		self.strategy
	}

	/// Whether forwarding headers take part in client resolution.
	pub fn trusts_forwarded_headers(&self) -> bool {
		self.trust_forwarded_headers
	}

	/// Client address used in the limiter key.
	pub fn client_ip(
		&self,
		forwarded_for: Option<&str>,
		real_ip: Option<&str>,
		peer: Option<IpAddr>,
	) -> String {
		if self.trust_forwarded_headers {
			resolve_client_ip(forwarded_for, real_ip, peer)
		} else {
			resolve_client_ip(None, None, peer)
		}
	}

	/// Builds the limiter key for a request.
	pub fn key(&self, path: &str, client_ip: &str) -> String {
		match self.strategy {
			KeyStrategy::ClientIp => client_ip.to_owned(),
			KeyStrategy::PathAndClientIp => format!("{path}/{client_ip}"),
		}
	}

	/// Returns `true` if the request may proceed.
	pub fn admit(&self, path: &str, client_ip: &str) -> bool {
		self.limiter.allow(&self.key(path, client_ip))
	}
}

/// Picks the client address: the first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// connection peer. Header values that are not IP addresses are ignored.
pub fn resolve_client_ip(
	forwarded_for: Option<&str>,
	real_ip: Option<&str>,
	peer: Option<IpAddr>,
) -> String {
	let forwarded = forwarded_for.and_then(|v| v.split(',').next());

	[forwarded, real_ip]
		.into_iter()
		.flatten()
		.find_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
		.or(peer)
		.map_or_else(|| UNKNOWN_CLIENT.to_owned(), |ip| ip.to_string())
}
