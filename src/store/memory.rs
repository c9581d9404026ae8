//! Thread-safe in-memory [`RecoveryRepository`] for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{TokenHash, UserId},
	store::{RecoveryRecord, RecoveryRepository, StoreFuture},
};

/// Digest-keyed records plus a per-user index enforcing one live token per account.
#[derive(Clone, Debug, Default)]
pub(crate) struct RecordTable {
	by_hash: HashMap<TokenHash, RecoveryRecord>,
	by_user: HashMap<UserId, TokenHash>,
}
impl RecordTable {
	pub(crate) fn from_records(records: impl IntoIterator<Item = RecoveryRecord>) -> Self {
		let mut table = Self::default();

		for record in records {
			table.upsert(record);
		}

		table
	}

	pub(crate) fn upsert(&mut self, record: RecoveryRecord) {
		if let Some(previous) = self.by_user.insert(record.user_id.clone(), record.hash.clone()) {
			self.by_hash.remove(&previous);
		}

		self.by_hash.insert(record.hash.clone(), record);
	}

	pub(crate) fn get(&self, hash: &TokenHash) -> Option<RecoveryRecord> {
		self.by_hash.get(hash).cloned()
	}

	pub(crate) fn remove(&mut self, hash: &TokenHash) -> bool {
		match self.by_hash.remove(hash) {
			Some(record) => {
				self.by_user.remove(&record.user_id);

				true
			},
			None => false,
		}
	}

	pub(crate) fn remove_older_than(&mut self, cutoff: OffsetDateTime) -> u64 {
		let before = self.by_hash.len();

		self.by_hash.retain(|_, record| record.created_at >= cutoff);
		self.by_user.retain(|_, hash| self.by_hash.contains_key(hash));

		(before - self.by_hash.len()) as u64
	}

	pub(crate) fn len(&self) -> usize {
		self.by_hash.len()
	}

	pub(crate) fn records(&self) -> impl Iterator<Item = &RecoveryRecord> {
		self.by_hash.values()
	}
}

/// Thread-safe repository that keeps recovery records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryRepository(Arc<RwLock<RecordTable>>);
impl MemoryRepository {
	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true if no record is stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns true if a record holds the digest of `plaintext`.
	pub fn contains_plaintext(&self, plaintext: &str) -> bool {
		self.0.read().get(&TokenHash::of(plaintext)).is_some()
	}

	/// Snapshot of every stored record.
	pub fn records(&self) -> Vec<RecoveryRecord> {
		self.0.read().records().cloned().collect()
	}
}
impl RecoveryRepository for MemoryRepository {
	fn create_or_replace(&self, record: RecoveryRecord) -> StoreFuture<'_, ()> {
		let table = self.0.clone();

		Box::pin(async move {
			table.write().upsert(record);

			Ok(())
		})
	}

	fn find_by_hash<'a>(&'a self, hash: &'a TokenHash) -> StoreFuture<'a, Option<RecoveryRecord>> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.read().get(hash)) })
	}

	fn delete_by_hash<'a>(&'a self, hash: &'a TokenHash) -> StoreFuture<'a, bool> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.write().remove(hash)) })
	}

	fn delete_older_than(&self, cutoff: OffsetDateTime) -> StoreFuture<'_, u64> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.write().remove_older_than(cutoff)) })
	}
}
