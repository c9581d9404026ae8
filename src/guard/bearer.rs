//! Bearer-token guard with an optional per-route role allow-list.

// self
use crate::{
	_prelude::*,
	auth::Role,
	guard::{self, AuthError, Principal},
	obs::{self, AuthMetrics, Component, Event},
	signer::TokenSigner,
};

/// Authenticates `Authorization: Bearer <token>` and enforces an allowed-role set.
///
/// An empty role set admits any verified token.
#[derive(Clone, Debug)]
pub struct BearerAuthorizer {
	signer: Arc<TokenSigner>,
	roles: HashSet<Role>,
	metrics: Arc<AuthMetrics>,
}
impl BearerAuthorizer {
	/// Creates a guard admitting the given roles.
	pub fn new<I>(signer: Arc<TokenSigner>, roles: I) -> Self
	where
		I: IntoIterator<Item = Role>,
	{
		Self { signer, roles: roles.into_iter().collect(), metrics: Default::default() }
	}

	/// Creates a guard that only requires a valid token.
	pub fn any_role(signer: Arc<TokenSigner>) -> Self {
		Self { signer, roles: HashSet::new(), metrics: Default::default() }
	}

	/// Shares an external metrics handle.
	pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
		self.metrics = metrics;

		self
	}

	/// Roles admitted by this guard.
	pub fn roles(&self) -> &HashSet<Role> {
		&self.roles
	}

	/// Verifies the header value and returns the caller's identity.
	pub fn authorize(&self, header: Option<&str>) -> Result<Principal, AuthError> {
		let result = self.authorize_inner(header);

		match &result {
			Ok(_) => self.metrics.record(Component::Bearer, Event::AuthGranted),
			Err(e) => {
				self.metrics.record(Component::Bearer, Event::AuthDenied);
				obs::log_rejection(Component::Bearer, e);
			},
		}

		result
	}

	fn authorize_inner(&self, header: Option<&str>) -> Result<Principal, AuthError> {
		let token = guard::split_authorization(header, "Bearer")?;
		let principal = Principal::try_from(self.signer.verify(token)?)?;

		if !self.roles.is_empty() && !self.roles.contains(&principal.role) {
			return Err(AuthError::ForbiddenRole { role: principal.role });
		}

		Ok(principal)
	}
}
