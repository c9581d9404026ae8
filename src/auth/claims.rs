//! Identity and authorization payload embedded in bearer tokens.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, Role, ScopeSet, UserId},
};

/// Claims carried by a signed bearer token.
///
/// Registered claims use their JWT wire names (`sub`, `iss`, `aud`, `iat`, `exp`); the service
/// version travels as `version`. A verified value always has `semver`, `issuer`, and `audience`
/// equal to the verifier's configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	/// Opaque user identifier.
	#[serde(rename = "sub")]
	pub subject: String,
	/// Permission class of the subject.
	pub role: Role,
	/// Capabilities granted to the subject.
	pub scope: ScopeSet,
	/// Service API version at signing time; bumping it invalidates every outstanding token.
	#[serde(rename = "version")]
	pub semver: String,
	/// Signing authority.
	#[serde(rename = "iss")]
	pub issuer: String,
	/// Intended recipient.
	#[serde(rename = "aud")]
	pub audience: String,
	/// Unix timestamp the token was issued at.
	#[serde(rename = "iat")]
	pub issued_at: i64,
	/// Unix timestamp after which the token is rejected.
	#[serde(rename = "exp")]
	pub expires_at: i64,
}
impl Claims {
	/// Sets the subject.
	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = subject.into();

		self
	}

	/// Sets the role.
	pub fn with_role(mut self, role: Role) -> Self {
		self.role = role;

		self
	}

	/// Sets the scope set.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Parses the subject as a validated [`UserId`].
	pub fn user_id(&self) -> Result<UserId, IdentifierError> {
		UserId::new(&self.subject)
	}

	/// Returns `true` once `instant` reaches the expiry timestamp.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant.unix_timestamp() >= self.expires_at
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn wire_names_follow_registered_claims() {
		let claims = Claims {
			subject: "u1".into(),
			role: Role::ADMIN,
			scope: ScopeSet::from_str("profile openid").expect("Scope fixture should parse."),
			semver: "1.0.0".into(),
			issuer: "iss".into(),
			audience: "aud".into(),
			issued_at: 10,
			expires_at: 20,
		};
		let value = serde_json::to_value(&claims).expect("Claims should serialize.");

		assert_eq!(value["sub"], "u1");
		assert_eq!(value["role"], "admin");
		assert_eq!(value["scope"], "openid profile");
		assert_eq!(value["version"], "1.0.0");
		assert_eq!(value["iss"], "iss");
		assert_eq!(value["aud"], "aud");
		assert_eq!(value["iat"], 10);
		assert_eq!(value["exp"], 20);
	}

	#[test]
	fn expiry_is_inclusive_of_exp_second() {
		let claims = Claims { expires_at: 100, ..Default::default() };

		assert!(!claims.is_expired_at(OffsetDateTime::from_unix_timestamp(99).expect("valid ts")));
		assert!(claims.is_expired_at(OffsetDateTime::from_unix_timestamp(100).expect("valid ts")));
	}

	#[test]
	fn builder_helpers_set_identity() {
		let claims = Claims::default().with_subject("u9").with_role(Role::USER);

		assert_eq!(claims.user_id().expect("Subject should be a valid user id.").as_ref(), "u9");
		assert_eq!(claims.role, Role::USER);
		assert!(Claims::default().user_id().is_err());
	}
}
