//! Serde-backed configuration for every component, with defaults and validation.
//!
//! Loading the raw document (files, environment, secrets managers) is left to the host service;
//! this module only parses and validates it.
//!
//! ```
//! use microauth::config::AuthConfig;
//!
//! let config = AuthConfig::from_json_str(
//! 	r#"{
//! 		"token": {
//! 			"secret": "0123456789abcdef0123456789abcdef",
//! 			"issuer": "accountsvc",
//! 			"audience": "web",
//! 			"semver": "1.0.0"
//! 		},
//! 		"rate_limit": { "requests": 12, "period_secs": 60 }
//! 	}"#,
//! )
//! .expect("Example config should parse.");
//!
//! assert_eq!(config.recovery.ttl_secs, 600);
//! ```

// self
use crate::{
	_prelude::*,
	auth::{Role, ScopeSet, TokenSecret},
	error::ConfigError,
	guard::{BasicAuthorizer, KeyStrategy},
	limiter::Quota,
	signer::{DEFAULT_SCOPE, DEFAULT_TOKEN_LIFETIME, SignerConfig},
};

/// Minimum accepted signing-secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

// Caps every duration at roughly a century so instant arithmetic cannot overflow.
const MAX_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Complete configuration for the authentication core.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
	/// Bearer-token settings.
	pub token: TokenSection,
	/// Rate-limiter settings.
	pub rate_limit: RateLimitSection,
	/// Recovery-token settings.
	pub recovery: RecoverySection,
	/// Basic-credential settings.
	pub basic: BasicSection,
}
impl AuthConfig {
	/// Parses and validates a JSON document.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		Self::from_json_slice(json.as_bytes())
	}

	/// Parses and validates a JSON document from raw bytes.
	pub fn from_json_slice(json: &[u8]) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_slice(json);
		let config: Self = serde_path_to_error::deserialize(&mut deserializer)?;

		config.validate()?;

		Ok(config)
	}

	/// Checks every section.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.token.signer_config()?;
		self.rate_limit.validate()?;
		self.recovery.ttl()?;
		self.recovery.sweep_interval()?;
		self.basic.authorizer()?;

		Ok(())
	}
}

/// Bearer-token settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenSection {
	/// HMAC signing secret (at least [`MIN_SECRET_LEN`] bytes).
	pub secret: TokenSecret,
	/// Issuer stamped into and required from every token.
	pub issuer: String,
	/// Audience stamped into and required from every token.
	pub audience: String,
	/// Service version stamped into and required from every token.
	pub semver: String,
	/// Token lifetime in seconds.
	pub lifetime_secs: u64,
	/// Role placed in the claims template.
	pub default_role: Role,
	/// Space-delimited scope placed in the claims template.
	pub default_scope: String,
}
impl TokenSection {
	/// Builds a validated [`SignerConfig`].
	pub fn signer_config(&self) -> Result<SignerConfig, ConfigError> {
		if self.secret.len() < MIN_SECRET_LEN {
			return Err(ConfigError::WeakSecret { min: MIN_SECRET_LEN });
		}

		non_empty("token.issuer", &self.issuer)?;
		non_empty("token.audience", &self.audience)?;
		non_empty("token.semver", &self.semver)?;
		non_empty("token.default_role", self.default_role.as_str())?;

		let mut config = SignerConfig::new(
			self.secret.clone(),
			self.issuer.clone(),
			self.audience.clone(),
			self.semver.clone(),
		)
		.with_lifetime(seconds("token.lifetime_secs", self.lifetime_secs)?);

		config.default_role = self.default_role.clone();
		config.default_scope = self.default_scope.parse::<ScopeSet>()?;

		Ok(config)
	}
}
impl Default for TokenSection {
	fn default() -> Self {
		Self {
			secret: TokenSecret::default(),
			issuer: String::new(),
			audience: String::new(),
			semver: String::new(),
			lifetime_secs: DEFAULT_TOKEN_LIFETIME.whole_seconds().unsigned_abs(),
			default_role: Role::GUEST,
			default_scope: DEFAULT_SCOPE.into(),
		}
	}
}

/// Rate-limiter settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitSection {
	/// Requests admitted per period.
	pub requests: u32,
	/// Period length in seconds.
	pub period_secs: u64,
	/// Burst capacity.
	pub burst: u32,
	/// Seconds between visitor sweeps.
	pub cleanup_interval_secs: u64,
	/// Idle seconds after which a visitor is evicted.
	pub visitor_expiry_secs: u64,
	/// How requests map onto limiter keys.
	pub key: KeyStrategy,
	/// Identify clients by `X-Forwarded-For`/`X-Real-IP` instead of the connection peer.
	///
	/// Only safe behind a reverse proxy that overwrites both headers.
	pub trust_forwarded_headers: bool,
}
impl RateLimitSection {
	/// Checks numeric bounds.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.quota()?;
		self.cleanup_interval()?;
		self.visitor_expiry()?;

		Ok(())
	}

	/// Quota handed to each visitor.
	pub fn quota(&self) -> Result<Quota, ConfigError> {
		if self.requests == 0 {
			return Err(ConfigError::NonPositive { field: "rate_limit.requests" });
		}
		if self.burst == 0 {
			return Err(ConfigError::NonPositive { field: "rate_limit.burst" });
		}

		let period = seconds("rate_limit.period_secs", self.period_secs)?;

		Ok(Quota::per(period, self.requests).with_burst(self.burst))
	}

	/// Interval between visitor sweeps.
	pub fn cleanup_interval(&self) -> Result<Duration, ConfigError> {
		seconds("rate_limit.cleanup_interval_secs", self.cleanup_interval_secs)
	}

	/// Idle time after which a visitor is evicted.
	pub fn visitor_expiry(&self) -> Result<Duration, ConfigError> {
		seconds("rate_limit.visitor_expiry_secs", self.visitor_expiry_secs)
	}
}
impl Default for RateLimitSection {
	fn default() -> Self {
		Self {
			requests: 12,
			period_secs: 60,
			burst: 1,
			cleanup_interval_secs: 60,
			visitor_expiry_secs: 180,
			key: KeyStrategy::default(),
			trust_forwarded_headers: false,
		}
	}
}

/// Recovery-token settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoverySection {
	/// Token lifetime in seconds.
	pub ttl_secs: u64,
	/// Seconds between expiry sweeps; twice the TTL when absent.
	pub sweep_interval_secs: Option<u64>,
}
impl RecoverySection {
	/// Token lifetime.
	pub fn ttl(&self) -> Result<Duration, ConfigError> {
		seconds("recovery.ttl_secs", self.ttl_secs)
	}

	/// Sweep interval, defaulting to twice the TTL.
	pub fn sweep_interval(&self) -> Result<Duration, ConfigError> {
		match self.sweep_interval_secs {
			Some(secs) => seconds("recovery.sweep_interval_secs", secs),
			None => Ok(self.ttl()? * 2),
		}
	}
}
impl Default for RecoverySection {
	fn default() -> Self {
		Self { ttl_secs: 600, sweep_interval_secs: None }
	}
}

/// Basic-credential settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BasicSection {
	/// Hex SHA-256 digests of accepted `user:password` strings.
	pub credentials: Vec<String>,
}
impl BasicSection {
	/// Builds the guard for the configured digests.
	pub fn authorizer(&self) -> Result<BasicAuthorizer, ConfigError> {
		BasicAuthorizer::from_digests(&self.credentials)
	}
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
	if value.trim().is_empty() { Err(ConfigError::EmptyField { field }) } else { Ok(()) }
}

fn seconds(field: &'static str, secs: u64) -> Result<Duration, ConfigError> {
	match secs {
		0 => Err(ConfigError::NonPositive { field }),
		secs if secs > MAX_SECS => Err(ConfigError::OutOfRange { field }),
		secs => Ok(Duration::seconds(secs as i64)),
	}
}
