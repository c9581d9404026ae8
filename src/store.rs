//! Persistence contracts and built-in repositories for recovery-token records.

pub mod file;
pub mod memory;

pub use file::FileRepository;
pub use memory::MemoryRepository;

// self
use crate::{
	_prelude::*,
	auth::{TokenHash, UserId},
};

/// Boxed future returned by [`RecoveryRepository`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for recovery tokens.
///
/// Only token digests are ever handed to a repository; plaintext tokens never leave the recovery
/// store. Each user owns at most one live record.
pub trait RecoveryRepository
where
	Self: Send + Sync,
{
	/// Persists `record`, replacing any record previously held by the same user.
	fn create_or_replace(&self, record: RecoveryRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record whose digest equals `hash`, if present.
	fn find_by_hash<'a>(&'a self, hash: &'a TokenHash) -> StoreFuture<'a, Option<RecoveryRecord>>;

	/// Removes the record whose digest equals `hash`.
	///
	/// Returns `true` only for the caller that actually removed it; concurrent consumers of the
	/// same token observe `false`.
	fn delete_by_hash<'a>(&'a self, hash: &'a TokenHash) -> StoreFuture<'a, bool>;

	/// Removes every record created strictly before `cutoff`; returns how many were removed.
	fn delete_older_than(&self, cutoff: OffsetDateTime) -> StoreFuture<'_, u64>;
}

/// Persisted form of an issued recovery token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
	/// Account the token was issued for.
	pub user_id: UserId,
	/// SHA-256 digest of the plaintext token.
	pub hash: TokenHash,
	/// Issue instant used for expiry decisions.
	pub created_at: OffsetDateTime,
}
impl RecoveryRecord {
	/// Builds a record for `user_id` issued at `created_at`.
	pub fn new(user_id: UserId, hash: TokenHash, created_at: OffsetDateTime) -> Self {
		Self { user_id, hash, created_at }
	}

	/// Returns true once more than `ttl` has elapsed since issue at `now`.
	pub fn is_expired_at(&self, ttl: Duration, now: OffsetDateTime) -> bool {
		now - self.created_at > ttl
	}
}

/// Error type produced by [`RecoveryRepository`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, error::Error};

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("database unreachable"));

		let source = StdError::source(&error)
			.expect("Crate error should expose the underlying store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn record_stays_valid_through_ttl() {
		let user = UserId::new("user-1").expect("User fixture should be valid.");
		let record = RecoveryRecord::new(user, TokenHash::of("plain"), test_epoch());
		let ttl = Duration::minutes(10);

		assert!(!record.is_expired_at(ttl, test_epoch() + ttl));
		assert!(record.is_expired_at(ttl, test_epoch() + ttl + Duration::SECOND));
	}

	#[test]
	fn record_serializes_digest_only() {
		let user = UserId::new("user-1").expect("User fixture should be valid.");
		let record = RecoveryRecord::new(user, TokenHash::of("plain"), test_epoch());
		let payload = serde_json::to_string(&record).expect("Record should serialize to JSON.");
		let restored: RecoveryRecord =
			serde_json::from_str(&payload).expect("Serialized record should deserialize.");

		assert!(!payload.contains("\"plain\""), "Only the digest may be persisted.");
		assert_eq!(restored, record);
	}
}
