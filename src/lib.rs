//! Microservice authentication core: signed bearer tokens, role-gated middleware, per-client
//! rate limiting, and one-time password-recovery tokens with background expiry sweeps.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod flows;
pub mod guard;
#[cfg(feature = "axum")] pub mod http;
pub mod limiter;
pub mod obs;
pub mod recovery;
pub mod signer;
pub mod store;
pub mod task;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use time::macros;
	// self
	use crate::{
		clock::{Clock, ManualClock},
		recovery::RecoveryTokenStore,
		signer::{SignerConfig, TokenSigner},
		store::{MemoryRepository, RecoveryRepository},
	};

	/// Signing secret shared by test fixtures; long enough to pass config validation.
	pub const TEST_SECRET: &str = "test-signing-secret-0123456789abcdef";
	/// Issuer stamped into fixture tokens.
	pub const TEST_ISSUER: &str = "microauth-test";
	/// Audience stamped into fixture tokens.
	pub const TEST_AUDIENCE: &str = "accountsvc";
	/// Service version stamped into fixture tokens.
	pub const TEST_SEMVER: &str = "1.0.0";

	/// Fixed instant every manual fixture clock starts from.
	pub fn test_epoch() -> OffsetDateTime {
		macros::datetime!(2025-01-01 00:00 UTC)
	}

	/// Builds a manual clock parked at [`test_epoch`].
	pub fn manual_clock() -> Arc<ManualClock> {
		Arc::new(ManualClock::new(test_epoch()))
	}

	/// Signer configuration matching the fixture constants.
	pub fn test_signer_config() -> SignerConfig {
		SignerConfig::new(TEST_SECRET, TEST_ISSUER, TEST_AUDIENCE, TEST_SEMVER)
	}

	/// Builds a [`TokenSigner`] driven by the provided clock.
	pub fn build_test_signer(clock: Arc<dyn Clock>) -> TokenSigner {
		TokenSigner::new(test_signer_config()).with_clock(clock)
	}

	/// Builds a recovery store backed by an in-memory repository, returning both so tests can
	/// inspect persisted rows.
	pub fn build_test_recovery(
		clock: Arc<dyn Clock>,
		ttl: Duration,
	) -> (RecoveryTokenStore, Arc<MemoryRepository>) {
		let backend = Arc::new(MemoryRepository::default());
		let repository: Arc<dyn RecoveryRepository> = backend.clone();
		let store = RecoveryTokenStore::new(repository, ttl).with_clock(clock);

		(store, backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::Result;
}

#[cfg(feature = "axum")] pub use axum;
pub use time;
#[cfg(test)] use {color_eyre as _, tower as _};
