//! Account-level use cases composed from the recovery store and an account directory.

pub mod password_recovery;

pub use password_recovery::*;

// self
use crate::{
	auth::{TokenSecret, UserId},
	store::StoreFuture,
};

/// Account lookup and password persistence owned by the host service.
///
/// Password hashing is the directory's concern; flows hand it the plaintext wrapped in a
/// [`TokenSecret`] so it never reaches logs.
pub trait AccountDirectory
where
	Self: Send + Sync,
{
	/// Resolves the account registered under `email`, if any.
	fn user_id_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<UserId>>;

	/// Replaces the password of `user_id`; returns `false` when the directory refused the update.
	fn update_password<'a>(
		&'a self,
		user_id: &'a UserId,
		password: &'a TokenSecret,
	) -> StoreFuture<'a, bool>;
}
