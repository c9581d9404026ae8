//! Forgot-password flow: request a recovery token by email, then redeem it to set a new
//! password.

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UserId},
	flows::AccountDirectory,
	recovery::{RecoveryError, RecoveryTokenStore},
};

/// Result of a successful recovery request. The token must be delivered out of band.
#[derive(Clone, Debug)]
pub struct RecoveryTicket {
	/// Account the token was issued for.
	pub user_id: UserId,
	/// Plaintext token; shown once, never stored.
	pub token: TokenSecret,
}

/// Input to [`PasswordRecovery::reset_password`].
#[derive(Clone, Debug, Deserialize)]
pub struct ResetPassword {
	/// Plaintext recovery token.
	pub token: TokenSecret,
	/// New password.
	pub password: TokenSecret,
	/// Confirmation that must equal `password`.
	pub confirm_password: TokenSecret,
}
impl ResetPassword {
	/// Bundles a reset request.
	pub fn new(
		token: impl Into<TokenSecret>,
		password: impl Into<TokenSecret>,
		confirm_password: impl Into<TokenSecret>,
	) -> Self {
		Self {
			token: token.into(),
			password: password.into(),
			confirm_password: confirm_password.into(),
		}
	}
}

/// Composes an [`AccountDirectory`] with a [`RecoveryTokenStore`].
#[derive(Clone)]
pub struct PasswordRecovery {
	directory: Arc<dyn AccountDirectory>,
	tokens: Arc<RecoveryTokenStore>,
}
impl PasswordRecovery {
	/// Creates the flow.
	pub fn new(directory: Arc<dyn AccountDirectory>, tokens: Arc<RecoveryTokenStore>) -> Self {
		Self { directory, tokens }
	}

	/// Issues a recovery token for the account registered under `email`.
	///
	/// Unknown addresses yield [`RecoveryError::InvalidRequest`], whose public message matches
	/// the one for unknown tokens.
	pub async fn request_recovery(&self, email: &str) -> Result<RecoveryTicket, RecoveryError> {
		let email = email.trim();

		if email.is_empty() {
			return Err(RecoveryError::InvalidRequest);
		}

		let user_id = self
			.directory
			.user_id_by_email(email)
			.await?
			.ok_or(RecoveryError::InvalidRequest)?;
		let token = self.tokens.issue_token(&user_id).await?;

		Ok(RecoveryTicket { user_id, token })
	}

	/// Redeems the token in `request` and stores the new password; returns the affected account.
	///
	/// The token is spent before the directory is updated. A directory failure after that point
	/// requires the user to start over.
	pub async fn reset_password(&self, request: &ResetPassword) -> Result<UserId, RecoveryError> {
		if request.token.is_empty() || request.password.is_empty() {
			return Err(RecoveryError::InvalidRequest);
		}
		if request.password != request.confirm_password {
			return Err(RecoveryError::InvalidPassword);
		}

		let user_id = self.tokens.consume_token(request.token.expose()).await?;

		if !self.directory.update_password(&user_id, &request.password).await? {
			return Err(RecoveryError::InvalidPassword);
		}

		Ok(user_id)
	}
}
impl Debug for PasswordRecovery {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PasswordRecovery").field("tokens", &self.tokens).finish()
	}
}
