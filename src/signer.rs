//! Stateless HS256 bearer-token signer and verifier.
//!
//! [`TokenSigner::sign`] starts from a claims template pre-populated with the configured issuer,
//! audience, and service version, lets the caller mutate it (subject, role, scope), and stamps
//! `iat`/`exp` from the signer's clock. [`TokenSigner::verify`] checks structure and signature,
//! then expiry against the same clock, and finally pins `version`/`iss`/`aud` to the local
//! configuration so bumping any of them invalidates every outstanding token at once.

// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind as JwtErrorKind,
};
// self
use crate::{
	_prelude::*,
	auth::{Claims, Role, ScopeSet, TokenSecret},
	clock::{self, Clock},
	obs::{self, AuthMetrics, Component, Event},
};

/// Default token lifetime: one week.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::weeks(1);
/// Scope granted when the caller does not override it.
pub const DEFAULT_SCOPE: &str = "default";

/// Why a structurally valid token failed cryptographic or temporal checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectCause {
	/// Signature does not verify under the configured secret.
	Signature,
	/// Token is past its `exp` timestamp.
	Expired,
}

/// Registered claim pinned to the verifier's configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinnedClaim {
	/// `version` claim.
	Semver,
	/// `iss` claim.
	Issuer,
	/// `aud` claim.
	Audience,
}
impl PinnedClaim {
	/// Returns the wire name of the claim.
	pub const fn as_str(self) -> &'static str {
		match self {
			PinnedClaim::Semver => "version",
			PinnedClaim::Issuer => "iss",
			PinnedClaim::Audience => "aud",
		}
	}
}

/// Errors produced while signing or verifying bearer tokens.
#[derive(Debug, ThisError)]
pub enum TokenError {
	/// The claims mutator left the subject empty.
	#[error("Token subject is required.")]
	MissingSubject,
	/// Serialization or signing failed.
	#[error("Signing token failed.")]
	Signing(#[source] jsonwebtoken::errors::Error),
	/// The token string is not a well-formed signed token.
	#[error("Token is malformed.")]
	Malformed(#[source] jsonwebtoken::errors::Error),
	/// Signature check failed or the token has expired.
	#[error("Token signature is invalid or expired ({cause:?}).")]
	InvalidSignature {
		/// Internal cause; never surfaced to clients.
		cause: RejectCause,
	},
	/// A pinned claim differs from the verifier's configuration.
	#[error("Token claim `{}` does not match this service.", claim.as_str())]
	ClaimMismatch {
		/// The first mismatching claim.
		claim: PinnedClaim,
	},
}
impl TokenError {
	/// Returns `true` if the token itself was rejected, as opposed to a local signing failure.
	pub fn is_rejection(&self) -> bool {
		!matches!(self, TokenError::MissingSubject | TokenError::Signing(_))
	}
}

/// Settings for a [`TokenSigner`].
#[derive(Clone, Debug)]
pub struct SignerConfig {
	/// Symmetric HMAC secret.
	pub secret: TokenSecret,
	/// Signing authority stamped into and required from every token.
	pub issuer: String,
	/// Intended recipient stamped into and required from every token.
	pub audience: String,
	/// Service API version stamped into and required from every token.
	pub semver: String,
	/// Fixed lifetime added to the signing instant.
	pub lifetime: Duration,
	/// Role placed in the claims template.
	pub default_role: Role,
	/// Scope placed in the claims template.
	pub default_scope: ScopeSet,
}
impl SignerConfig {
	/// Creates a configuration with the default lifetime, role, and scope.
	pub fn new(
		secret: impl Into<TokenSecret>,
		issuer: impl Into<String>,
		audience: impl Into<String>,
		semver: impl Into<String>,
	) -> Self {
		Self {
			secret: secret.into(),
			issuer: issuer.into(),
			audience: audience.into(),
			semver: semver.into(),
			lifetime: DEFAULT_TOKEN_LIFETIME,
			default_role: Role::GUEST,
			default_scope: default_scope(),
		}
	}

	/// Overrides the token lifetime.
	pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
		self.lifetime = lifetime;

		self
	}
}

/// Creates and verifies signed claim sets. Safe for unlimited concurrent use.
#[derive(Clone)]
pub struct TokenSigner {
	config: SignerConfig,
	encoding: EncodingKey,
	decoding: DecodingKey,
	validation: Validation,
	clock: Arc<dyn Clock>,
	metrics: Arc<AuthMetrics>,
}
impl TokenSigner {
	/// Builds a signer from the provided configuration using the system clock.
	pub fn new(config: SignerConfig) -> Self {
		let secret = config.secret.expose().as_bytes();
		let mut validation = Validation::new(Algorithm::HS256);

		// Expiry and pinned claims are checked against the injected clock and local config.
		validation.validate_exp = false;
		validation.validate_aud = false;

		Self {
			encoding: EncodingKey::from_secret(secret),
			decoding: DecodingKey::from_secret(secret),
			validation,
			config,
			clock: clock::system(),
			metrics: Default::default(),
		}
	}

	/// Replaces the clock used for `iat`/`exp` stamping and expiry checks.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Shares an external metrics handle.
	pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
		self.metrics = metrics;

		self
	}

	/// Returns the active configuration.
	pub fn config(&self) -> &SignerConfig {
		&self.config
	}

	/// Returns the claims template every signing call starts from.
	pub fn default_claims(&self) -> Claims {
		Claims {
			subject: String::new(),
			role: self.config.default_role.clone(),
			scope: self.config.default_scope.clone(),
			semver: self.config.semver.clone(),
			issuer: self.config.issuer.clone(),
			audience: self.config.audience.clone(),
			issued_at: 0,
			expires_at: 0,
		}
	}

	/// Signs the default claims after applying `build`.
	///
	/// `iat` and `exp` are always stamped from the signer clock, overriding whatever the mutator
	/// wrote.
	pub fn sign<F>(&self, build: F) -> Result<String, TokenError>
	where
		F: FnOnce(&mut Claims),
	{
		let mut claims = self.default_claims();

		build(&mut claims);

		if claims.subject.is_empty() {
			return Err(TokenError::MissingSubject);
		}

		let now = self.clock.now();

		claims.issued_at = now.unix_timestamp();
		claims.expires_at = (now + self.config.lifetime).unix_timestamp();

		let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
			.map_err(TokenError::Signing)?;

		self.metrics.record(Component::Signer, Event::TokenSigned);

		Ok(token)
	}

	/// Parses and validates a presented token.
	pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
		let result = self.verify_inner(token);

		match &result {
			Ok(_) => self.metrics.record(Component::Signer, Event::TokenVerified),
			Err(e) => {
				self.metrics.record(Component::Signer, Event::TokenRejected);
				obs::log_rejection(Component::Signer, e);
			},
		}

		result
	}

	fn verify_inner(&self, token: &str) -> Result<Claims, TokenError> {
		let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
			.map_err(classify)?
			.claims;

		if claims.is_expired_at(self.clock.now()) {
			return Err(TokenError::InvalidSignature { cause: RejectCause::Expired });
		}
		if claims.subject.is_empty() {
			return Err(malformed_subject());
		}

		self.check_pinned(&claims)?;

		Ok(claims)
	}

	fn check_pinned(&self, claims: &Claims) -> Result<(), TokenError> {
		let pinned = [
			(PinnedClaim::Semver, &claims.semver, &self.config.semver),
			(PinnedClaim::Issuer, &claims.issuer, &self.config.issuer),
			(PinnedClaim::Audience, &claims.audience, &self.config.audience),
		];

		for (claim, presented, expected) in pinned {
			if presented != expected {
				return Err(TokenError::ClaimMismatch { claim });
			}
		}

		Ok(())
	}
}
impl Debug for TokenSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSigner")
			.field("issuer", &self.config.issuer)
			.field("audience", &self.config.audience)
			.field("semver", &self.config.semver)
			.field("lifetime", &self.config.lifetime)
			.finish()
	}
}

fn classify(e: jsonwebtoken::errors::Error) -> TokenError {
	match e.kind() {
		JwtErrorKind::InvalidSignature | JwtErrorKind::InvalidAlgorithm =>
			TokenError::InvalidSignature { cause: RejectCause::Signature },
		JwtErrorKind::ExpiredSignature =>
			TokenError::InvalidSignature { cause: RejectCause::Expired },
		_ => TokenError::Malformed(e),
	}
}

fn malformed_subject() -> TokenError {
	TokenError::Malformed(JwtErrorKind::MissingRequiredClaim("sub".into()).into())
}

fn default_scope() -> ScopeSet {
	ScopeSet::new([DEFAULT_SCOPE]).unwrap_or_default()
}
