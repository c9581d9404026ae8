//! Basic-credential guard for service-to-service calls.
//!
//! The server keeps only SHA-256 digests of accepted `user:password` strings. A request passes
//! when the digest of its decoded credential is in the allow-list.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, URL_SAFE},
};
// self
use crate::{
	_prelude::*,
	auth,
	error::ConfigError,
	guard::{self, AuthError},
	obs::{self, AuthMetrics, Component, Event},
};

/// Authenticates `Authorization: Basic <base64(credential)>` against pre-hashed credentials.
#[derive(Clone, Debug)]
pub struct BasicAuthorizer {
	digests: HashSet<String>,
	metrics: Arc<AuthMetrics>,
}
impl BasicAuthorizer {
	/// Creates a guard from hex SHA-256 digests. Uppercase hex is accepted and normalized.
	pub fn from_digests<I, S>(digests: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let digests = digests
			.into_iter()
			.map(|digest| {
				let normalized = digest.as_ref().trim().to_ascii_lowercase();

				if auth::is_sha256_hex(&normalized) {
					Ok(normalized)
				} else {
					Err(ConfigError::InvalidDigest { digest: digest.as_ref().to_owned() })
				}
			})
			.collect::<Result<_, _>>()?;

		Ok(Self { digests, metrics: Default::default() })
	}

	/// Creates a guard from plaintext `user:password` credentials, hashing each one.
	pub fn from_credentials<I, S>(credentials: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let digests = credentials.into_iter().map(|c| auth::hash_token(c.as_ref())).collect();

		Self { digests, metrics: Default::default() }
	}

	/// Shares an external metrics handle.
	pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
		self.metrics = metrics;

		self
	}

	/// Number of accepted credentials.
	pub fn len(&self) -> usize {
		self.digests.len()
	}

	/// Returns true if no credential is accepted.
	pub fn is_empty(&self) -> bool {
		self.digests.is_empty()
	}

	/// Checks the header value against the allow-list.
	pub fn authorize(&self, header: Option<&str>) -> Result<(), AuthError> {
		let result = self.authorize_inner(header);

		match &result {
			Ok(()) => self.metrics.record(Component::Basic, Event::AuthGranted),
			Err(e) => {
				self.metrics.record(Component::Basic, Event::AuthDenied);
				obs::log_rejection(Component::Basic, e);
			},
		}

		result
	}

	fn authorize_inner(&self, header: Option<&str>) -> Result<(), AuthError> {
		let encoded = guard::split_authorization(header, "Basic")?;
		let decoded = STANDARD
			.decode(encoded)
			.or_else(|_| URL_SAFE.decode(encoded))
			.map_err(|_| AuthError::MalformedCredentials)?;

		// Digests are fixed server-side values, so a plain set lookup suffices.
		if !self.digests.contains(&auth::hash_bytes(&decoded)) {
			return Err(AuthError::InvalidCredentials);
		}

		Ok(())
	}
}
