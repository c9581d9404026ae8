//! Framework-agnostic request guards: bearer and Basic authorization plus rate-limit admission.
//!
//! Each guard takes the raw header value (or client key parts) and returns either a typed
//! success or an [`AuthError`]. The optional `axum` layer in `crate::http` maps these onto
//! responses; any other HTTP stack can do the same through [`AuthError::rejection`] and
//! [`AuthError::public_message`].

pub mod admission;
pub mod basic;
pub mod bearer;

pub use admission::*;
pub use basic::*;
pub use bearer::*;

// self
use crate::{
	_prelude::*,
	auth::{Claims, IdentifierError, Role, ScopeSet, UserId},
	signer::TokenError,
};

/// Status class a rejected request maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectionKind {
	/// Credentials were missing or invalid.
	Unauthorized,
	/// The caller is authenticated but not permitted.
	Forbidden,
	/// The caller exceeded its request budget.
	TooManyRequests,
}
impl RejectionKind {
	/// Stable machine-readable code used in rejection bodies.
	pub const fn code(self) -> &'static str {
		match self {
			RejectionKind::Unauthorized => "unauthorized",
			RejectionKind::Forbidden => "forbidden",
			RejectionKind::TooManyRequests => "too_many_requests",
		}
	}

	/// Generic client-visible message for the class.
	pub const fn public_message(self) -> &'static str {
		match self {
			RejectionKind::Unauthorized => "Authentication required.",
			RejectionKind::Forbidden => "Access to this resource is not permitted.",
			RejectionKind::TooManyRequests => "Too many requests.",
		}
	}
}

/// Reasons an authorization guard refused a request.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// The `Authorization` header is absent or not exactly `<scheme> <value>`.
	#[error("Authorization header is missing or malformed.")]
	MissingHeader,
	/// The header names a different scheme.
	#[error("Authorization scheme `{scheme}` is not supported here.")]
	UnsupportedScheme {
		/// Scheme the caller sent.
		scheme: String,
	},
	/// Bearer token verification failed.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// The token's subject is not a usable identifier.
	#[error("Token subject is invalid.")]
	InvalidSubject(#[from] IdentifierError),
	/// The verified role is not in the route's allow-list.
	#[error("Role `{role}` is not permitted on this route.")]
	ForbiddenRole {
		/// Role carried by the token.
		role: Role,
	},
	/// Basic credentials are not valid base64.
	#[error("Basic credentials are malformed.")]
	MalformedCredentials,
	/// Basic credentials are not in the allow-list.
	#[error("Basic credentials are not recognized.")]
	InvalidCredentials,
}
impl AuthError {
	/// Status class for the failure. Only a role mismatch is `Forbidden`.
	pub fn rejection(&self) -> RejectionKind {
		match self {
			AuthError::ForbiddenRole { .. } => RejectionKind::Forbidden,
			_ => RejectionKind::Unauthorized,
		}
	}

	/// Client-visible message; never names the failing check, claim, or role.
	pub fn public_message(&self) -> &'static str {
		self.rejection().public_message()
	}
}

/// Authenticated identity published to downstream handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
	/// Verified subject.
	pub subject: UserId,
	/// Permission class carried by the token.
	pub role: Role,
	/// Capabilities carried by the token.
	pub scope: ScopeSet,
}
impl Principal {
	/// Returns true if the principal holds `scope` as a whole entry.
	pub fn has_scope(&self, scope: &str) -> bool {
		self.scope.contains(scope)
	}
}
impl TryFrom<Claims> for Principal {
	type Error = IdentifierError;

	fn try_from(claims: Claims) -> Result<Self, Self::Error> {
		Ok(Self { subject: claims.user_id()?, role: claims.role, scope: claims.scope })
	}
}

/// Splits an `Authorization` value into its scheme and credential after checking the scheme.
///
/// The value must hold exactly two space-separated parts; the scheme matches case-insensitively.
pub(crate) fn split_authorization<'a>(
	header: Option<&'a str>,
	expected_scheme: &str,
) -> Result<&'a str, AuthError> {
	let header = header.ok_or(AuthError::MissingHeader)?;
	let mut parts = header.split(' ');
	let (Some(scheme), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
		return Err(AuthError::MissingHeader);
	};

	if scheme.is_empty() || value.is_empty() {
		return Err(AuthError::MissingHeader);
	}
	if !scheme.eq_ignore_ascii_case(expected_scheme) {
		return Err(AuthError::UnsupportedScheme { scheme: scheme.to_owned() });
	}

	Ok(value)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::signer::{PinnedClaim, RejectCause};

	#[test]
	fn header_must_have_exactly_two_parts() {
		for header in ["Bearer", "Bearer a b", "", " token", "Bearer "] {
			assert!(
				matches!(split_authorization(Some(header), "Bearer"), Err(AuthError::MissingHeader)),
				"{header:?} should be rejected as malformed."
			);
		}

		assert!(matches!(split_authorization(None, "Bearer"), Err(AuthError::MissingHeader)));
	}

	#[test]
	fn scheme_matches_case_insensitively() {
		assert_eq!(split_authorization(Some("bEaReR abc"), "Bearer").ok(), Some("abc"));
		assert!(matches!(
			split_authorization(Some("Basic abc"), "Bearer"),
			Err(AuthError::UnsupportedScheme { scheme }) if scheme == "Basic"
		));
	}

	#[test]
	fn only_role_mismatch_is_forbidden() {
		let forbidden = AuthError::ForbiddenRole { role: Role::GUEST };
		let expired = AuthError::Token(TokenError::InvalidSignature { cause: RejectCause::Expired });
		let tampered =
			AuthError::Token(TokenError::InvalidSignature { cause: RejectCause::Signature });
		let mismatch = AuthError::Token(TokenError::ClaimMismatch { claim: PinnedClaim::Issuer });

		assert_eq!(forbidden.rejection(), RejectionKind::Forbidden);

		for err in [&expired, &tampered, &mismatch, &AuthError::MissingHeader] {
			assert_eq!(err.rejection(), RejectionKind::Unauthorized);
		}

		assert_eq!(expired.public_message(), tampered.public_message());
		assert!(!mismatch.public_message().contains("iss"));
		assert!(!forbidden.public_message().contains("guest"));
	}

	#[test]
	fn principal_scope_check_uses_whole_entries() {
		let principal = Principal {
			subject: UserId::new("u1").expect("User fixture should be valid."),
			role: Role::USER,
			scope: ScopeSet::new(["profile", "openid"]).expect("Scope fixture should be valid."),
		};

		assert!(principal.has_scope("openid"));
		assert!(!principal.has_scope("open"));
	}
}
