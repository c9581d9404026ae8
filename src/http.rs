//! `axum` bindings for the request guards.
//!
//! Each middleware is a plain async function meant for
//! [`axum::middleware::from_fn_with_state`], with its guard as state:
//!
//! - [`rate_limit`] with `Arc<RateLimitGuard>`: answers `429` when the client's budget is spent.
//! - [`require_bearer`] with `Arc<BearerAuthorizer>`: answers `401`/`403`, otherwise inserts the
//!   [`Principal`](crate::guard::Principal) into the request extensions.
//! - [`require_basic`] with `Arc<BasicAuthorizer>`: answers `401` for unknown credentials.
//!
//! Every request is tagged with an `x-request-id` (the caller's, or a fresh ULID). The id is
//! stored as a [`RequestId`] extension, echoed on the response, and included in rejection bodies
//! so callers can correlate failures with server logs.

// std
use std::net::{IpAddr, SocketAddr};
// crates.io
use axum::{
	Json,
	extract::{ConnectInfo, Request, State},
	http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION},
	middleware::Next,
	response::{IntoResponse, Response},
};
use ulid::Ulid;
// self
use crate::{
	_prelude::*,
	guard::{AuthError, BasicAuthorizer, BearerAuthorizer, RateLimitGuard, RejectionKind},
};

/// Header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const REAL_IP_HEADER: &str = "x-real-ip";
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation id attached to every request passing through the middleware.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);
impl RequestId {
	/// Returns the id as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for RequestId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// JSON body of every rejection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Machine-readable rejection class.
	pub code: String,
	/// Generic, non-leaking description.
	pub error: String,
	/// Correlation id of the rejected request.
	pub request_id: String,
}

/// Short-circuit response produced by the middleware.
#[derive(Clone, Debug)]
pub struct Rejection {
	kind: RejectionKind,
	request_id: RequestId,
}
impl Rejection {
	/// Creates a rejection of `kind` for the request tagged `request_id`.
	pub fn new(kind: RejectionKind, request_id: RequestId) -> Self {
		Self { kind, request_id }
	}

	/// Rejection for a failed authorization check.
	pub fn from_auth(error: &AuthError, request_id: RequestId) -> Self {
		Self::new(error.rejection(), request_id)
	}

	/// HTTP status for the rejection class.
	pub fn status(&self) -> StatusCode {
		match self.kind {
			RejectionKind::Unauthorized => StatusCode::UNAUTHORIZED,
			RejectionKind::Forbidden => StatusCode::FORBIDDEN,
			RejectionKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
		}
	}
}
impl IntoResponse for Rejection {
	fn into_response(self) -> Response {
		let status = self.status();
		let body = ErrorBody {
			code: self.kind.code().into(),
			error: self.kind.public_message().into(),
			request_id: self.request_id.0.clone(),
		};
		let mut response = (status, Json(body)).into_response();

		echo_request_id(&mut response, &self.request_id);

		response
	}
}

/// Admits the request if the client's rate-limit budget allows it.
pub async fn rate_limit(
	State(guard): State<Arc<RateLimitGuard>>,
	mut request: Request,
	next: Next,
) -> Response {
	let request_id = ensure_request_id(&mut request);
	let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
	let client_ip = client_ip(&guard, request.headers(), peer);

	if !guard.admit(request.uri().path(), &client_ip) {
		return Rejection::new(RejectionKind::TooManyRequests, request_id).into_response();
	}

	forward(request, next, &request_id).await
}

/// Requires a valid bearer token whose role the guard admits.
pub async fn require_bearer(
	State(guard): State<Arc<BearerAuthorizer>>,
	mut request: Request,
	next: Next,
) -> Response {
	let request_id = ensure_request_id(&mut request);
	let outcome = guard.authorize(authorization(request.headers()));

	match outcome {
		Ok(principal) => {
			request.extensions_mut().insert(principal);

			forward(request, next, &request_id).await
		},
		Err(e) => Rejection::from_auth(&e, request_id).into_response(),
	}
}

/// Requires Basic credentials from the guard's allow-list.
pub async fn require_basic(
	State(guard): State<Arc<BasicAuthorizer>>,
	mut request: Request,
	next: Next,
) -> Response {
	let request_id = ensure_request_id(&mut request);
	let outcome = guard.authorize(authorization(request.headers()));

	match outcome {
		Ok(()) => forward(request, next, &request_id).await,
		Err(e) => Rejection::from_auth(&e, request_id).into_response(),
	}
}

async fn forward(request: Request, next: Next, request_id: &RequestId) -> Response {
	let mut response = next.run(request).await;

	echo_request_id(&mut response, request_id);

	response
}

/// Reads the caller's `x-request-id`, or assigns a fresh ULID, and records it on the request.
fn ensure_request_id(request: &mut Request) -> RequestId {
	if let Some(existing) = request.extensions().get::<RequestId>() {
		return existing.clone();
	}

	let id = request
		.headers()
		.get(REQUEST_ID_HEADER)
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
		.map(ToOwned::to_owned)
		.unwrap_or_else(|| Ulid::new().to_string());
	let request_id = RequestId(id);

	if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
		request.headers_mut().insert(REQUEST_ID_HEADER, value);
	}

	request.extensions_mut().insert(request_id.clone());

	request_id
}

fn echo_request_id(response: &mut Response, request_id: &RequestId) {
	if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
		response.headers_mut().insert(REQUEST_ID_HEADER, value);
	}
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
	headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

fn client_ip(guard: &RateLimitGuard, headers: &HeaderMap, peer: Option<IpAddr>) -> String {
	let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

	guard.client_ip(header(FORWARDED_FOR_HEADER), header(REAL_IP_HEADER), peer)
}
