//! Actor roles carried by bearer tokens.

// std
use std::borrow::Cow;
// crates.io
use serde::{Deserializer, Serializer};
// self
use crate::_prelude::*;

/// Permission class of the actor presenting a token. A subject holds exactly one role per token.
///
/// The well-known roles are exposed as constants; any other non-empty tag is accepted so services
/// can define their own classes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Role(Cow<'static, str>);
impl Role {
	/// Regular signed-in user.
	pub const USER: Self = Self(Cow::Borrowed("user"));
	/// Operator with administrative rights.
	pub const ADMIN: Self = Self(Cow::Borrowed("admin"));
	/// Anonymous or not-yet-verified actor; the default for freshly signed claims.
	pub const GUEST: Self = Self(Cow::Borrowed("guest"));
	/// Owner of the resource being accessed.
	pub const OWNER: Self = Self(Cow::Borrowed("owner"));

	/// Creates a role from an arbitrary tag.
	pub fn new(tag: impl Into<String>) -> Self {
		Self(Cow::Owned(tag.into()))
	}

	/// Returns the role tag.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Default for Role {
	fn default() -> Self {
		Self::GUEST
	}
}
impl AsRef<str> for Role {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}
impl From<&str> for Role {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl Debug for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Role({})", self.0)
	}
}
impl Display for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl Serialize for Role {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}
impl<'de> Deserialize<'de> for Role {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(Self::new)
	}
}
