//! Crate-level error types shared across the signer, guards, limiter, and recovery store.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs that span several components.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Bearer token could not be signed or verified.
	#[error(transparent)]
	Token(#[from] crate::signer::TokenError),
	/// Request was rejected by an authorization guard.
	#[error(transparent)]
	Auth(#[from] crate::guard::AuthError),
	/// Recovery token could not be issued or redeemed.
	#[error(transparent)]
	Recovery(#[from] crate::recovery::RecoveryError),
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Configuration payload could not be parsed.
	#[error("Configuration is malformed at `{}`.", source.path())]
	Parse {
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Signing secret is shorter than the accepted minimum.
	#[error("Signing secret must be at least {min} bytes.")]
	WeakSecret {
		/// Minimum accepted secret length in bytes.
		min: usize,
	},
	/// A required string field is empty.
	#[error("Configuration field `{field}` cannot be empty.")]
	EmptyField {
		/// Dotted path of the offending field.
		field: &'static str,
	},
	/// A numeric field must be strictly positive.
	#[error("Configuration field `{field}` must be positive.")]
	NonPositive {
		/// Dotted path of the offending field.
		field: &'static str,
	},
	/// A numeric field exceeds the supported range.
	#[error("Configuration field `{field}` exceeds the supported range.")]
	OutOfRange {
		/// Dotted path of the offending field.
		field: &'static str,
	},
	/// A configured credential digest is not a lowercase hex SHA-256 value.
	#[error("Basic credential digest `{digest}` is not a hex-encoded SHA-256 value.")]
	InvalidDigest {
		/// The rejected digest string.
		digest: String,
	},
	/// Default scope string is invalid.
	#[error("Default scope is invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(source: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Parse { source }
	}
}
