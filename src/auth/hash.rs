//! One-way digests and constant-time comparison for stored credentials.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
// self
use crate::{_prelude::*, auth::TokenSecret};

const RANDOM_TOKEN_BYTES: usize = 32;

/// Lowercase hex SHA-256 digest of a plaintext token; the only form ever persisted.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHash(String);
impl TokenHash {
	/// Hashes a plaintext token.
	pub fn of(plaintext: &str) -> Self {
		Self(hash_token(plaintext))
	}

	/// Wraps a digest that was already computed (e.g. loaded from storage).
	pub fn from_digest(digest: impl Into<String>) -> Self {
		Self(digest.into())
	}

	/// Returns the hex digest.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Compares two digests without short-circuiting on the first differing byte.
	pub fn ct_eq(&self, other: &TokenHash) -> bool {
		constant_time_eq(&self.0, &other.0)
	}
}
impl AsRef<str> for TokenHash {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for TokenHash {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		// A prefix is enough to correlate log lines without handing out the full lookup key.
		let prefix = self.0.get(..8).unwrap_or(&self.0);

		write!(f, "TokenHash({prefix}..)")
	}
}

/// Returns the lowercase hex SHA-256 digest of `plaintext`.
pub fn hash_token(plaintext: &str) -> String {
	hash_bytes(plaintext.as_bytes())
}

/// Returns the lowercase hex SHA-256 digest of raw bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
	let mut hasher = Sha256::new();

	hasher.update(bytes);

	hex::encode(hasher.finalize())
}

/// Compares two strings in time independent of where they differ.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
	a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Generates a high-entropy, URL-safe random token.
pub fn generate_token() -> TokenSecret {
	let mut bytes = [0_u8; RANDOM_TOKEN_BYTES];

	rand::rng().fill_bytes(&mut bytes);

	TokenSecret::new(URL_SAFE_NO_PAD.encode(bytes))
}

/// Returns true if `digest` looks like a lowercase hex SHA-256 value.
pub fn is_sha256_hex(digest: &str) -> bool {
	digest.len() == 64 && digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn hashing_is_deterministic_and_distinct() {
		assert_eq!(hash_token("token"), hash_token("token"));
		assert_ne!(hash_token("token-a"), hash_token("token-b"));
		assert_eq!(
			hash_token("admin:admin"),
			"8da193366e1554c08b2870c50f737b9587c3372b656151c4a96028af26f51334"
		);
		assert!(is_sha256_hex(&hash_token("anything")));
		assert!(!is_sha256_hex("D82494F0"));
	}

	#[test]
	fn constant_time_eq_matches_equality() {
		assert!(constant_time_eq("abc", "abc"));
		assert!(!constant_time_eq("abc", "abd"));
		assert!(!constant_time_eq("abc", "abcd"));

		let lhs = TokenHash::of("plain");

		assert!(lhs.ct_eq(&TokenHash::from_digest(hash_token("plain"))));
		assert!(!lhs.ct_eq(&TokenHash::of("other")));
	}

	#[test]
	fn generated_tokens_are_unique_and_url_safe() {
		let a = generate_token();
		let b = generate_token();

		assert_ne!(a, b);
		assert_eq!(a.len(), 43);
		assert!(a.expose().bytes().all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_'));
		assert_ne!(TokenHash::of(a.expose()), TokenHash::of(b.expose()));
	}

	#[test]
	fn debug_only_shows_prefix() {
		let hash = TokenHash::of("plain");
		let rendered = format!("{hash:?}");

		assert!(rendered.starts_with("TokenHash("));
		assert!(!rendered.contains(hash.as_str()));
	}
}
