//! File-backed [`RecoveryRepository`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::TokenHash,
	store::{RecoveryRecord, RecoveryRepository, StoreError, StoreFuture, memory::RecordTable},
};

/// Persists recovery records to a JSON file after each mutation.
///
/// Mutations are applied to a copy of the table and only become visible once the snapshot write
/// succeeded, so a failed write leaves memory and disk agreeing on the previous state.
#[derive(Clone, Debug)]
pub struct FileRepository {
	path: PathBuf,
	inner: Arc<RwLock<RecordTable>>,
}
impl FileRepository {
	/// Opens (or creates) a repository at `path`, eagerly loading existing records.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let records = load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(RecordTable::from_records(records))) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn commit<T>(
		&self,
		mutate: impl FnOnce(&mut RecordTable) -> (T, bool),
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let mut next = guard.clone();
		let (outcome, changed) = mutate(&mut next);

		if changed {
			self.persist_locked(&next)?;

			*guard = next;
		}

		Ok(outcome)
	}

	fn persist_locked(&self, table: &RecordTable) -> Result<(), StoreError> {
		ensure_parent_exists(&self.path)?;

		let snapshot = table.records().collect::<Vec<_>>();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize recovery snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| backend("create", &tmp_path, e))?;

			file.write_all(&serialized).map_err(|e| backend("write", &tmp_path, e))?;
			file.sync_all().map_err(|e| backend("sync", &tmp_path, e))?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| backend("replace", &self.path, e))
	}
}
impl RecoveryRepository for FileRepository {
	fn create_or_replace(&self, record: RecoveryRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.commit(|table| {
				table.upsert(record);

				((), true)
			})
		})
	}

	fn find_by_hash<'a>(&'a self, hash: &'a TokenHash) -> StoreFuture<'a, Option<RecoveryRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(hash)) })
	}

	fn delete_by_hash<'a>(&'a self, hash: &'a TokenHash) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			self.commit(|table| {
				let removed = table.remove(hash);

				(removed, removed)
			})
		})
	}

	fn delete_older_than(&self, cutoff: OffsetDateTime) -> StoreFuture<'_, u64> {
		Box::pin(async move {
			self.commit(|table| {
				let removed = table.remove_older_than(cutoff);

				(removed, removed > 0)
			})
		})
	}
}

fn load_snapshot(path: &Path) -> Result<Vec<RecoveryRecord>, StoreError> {
	if !path.exists() {
		return Ok(Vec::new());
	}

	let bytes = fs::read(path).map_err(|e| backend("read", path, e))?;

	if bytes.is_empty() {
		return Ok(Vec::new());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| backend("create directory", parent, e))?;
	}

	Ok(())
}

fn backend(action: &str, path: &Path, error: std::io::Error) -> StoreError {
	StoreError::Backend { message: format!("Failed to {action} {}: {error}", path.display()) }
}
