#![cfg(feature = "axum")]

// std
use std::{net::SocketAddr, sync::Arc};
// crates.io
use axum::{
	Extension, Router,
	body::{self, Body},
	extract::ConnectInfo,
	http::{Request, Response, StatusCode, header::AUTHORIZATION},
	middleware,
	routing::get,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use color_eyre::Result;
use time::macros;
use tower::ServiceExt;
// self
use microauth::{
	auth::{self, Role, ScopeSet, UserId},
	clock::ManualClock,
	config::{AuthConfig, BasicSection, RateLimitSection, TokenSection},
	core::AuthCore,
	guard::Principal,
	http::{ErrorBody, REQUEST_ID_HEADER, rate_limit, require_basic, require_bearer},
	store::MemoryRepository,
};

fn config(requests: u32, trust_forwarded_headers: bool) -> AuthConfig {
	AuthConfig {
		token: TokenSection {
			secret: "integration-signing-secret-0123456789".into(),
			issuer: "accountsvc".into(),
			audience: "web".into(),
			semver: "1.0.0".into(),
			..Default::default()
		},
		rate_limit: RateLimitSection {
			requests,
			burst: requests,
			trust_forwarded_headers,
			..Default::default()
		},
		basic: BasicSection { credentials: vec![auth::hash_token("admin:admin")] },
		..Default::default()
	}
}

fn build_core(requests: u32) -> AuthCore {
	build_core_with_trust(requests, true)
}

fn build_core_with_trust(requests: u32, trust_forwarded_headers: bool) -> AuthCore {
	let clock = Arc::new(ManualClock::new(macros::datetime!(2025-03-01 08:00 UTC)));

	AuthCore::from_config_with_clock(
		&config(requests, trust_forwarded_headers),
		Arc::new(MemoryRepository::default()),
		clock,
	)
	.expect("Integration config should be valid.")
}

async fn whoami(Extension(principal): Extension<Principal>) -> String {
	principal.subject.into()
}

fn app(core: &AuthCore) -> Router {
	let admin = Router::new()
		.route("/admin", get(whoami))
		.route_layer(middleware::from_fn_with_state(core.bearer([Role::ADMIN]), require_bearer));
	let internal = Router::new()
		.route("/internal", get(|| async { "ok" }))
		.route_layer(middleware::from_fn_with_state(core.basic(), require_basic));

	Router::new()
		.route("/public", get(|| async { "hello" }))
		.merge(admin)
		.merge(internal)
		.layer(middleware::from_fn_with_state(core.rate_limit_guard(), rate_limit))
}

fn request(path: &str, authorization: Option<&str>) -> Request<Body> {
	let mut builder = Request::builder().uri(path).header("x-forwarded-for", "203.0.113.7");

	if let Some(value) = authorization {
		builder = builder.header(AUTHORIZATION, value);
	}

	builder.body(Body::empty()).expect("Request fixture should build.")
}

fn bearer_for(core: &AuthCore, role: Role) -> String {
	let subject = UserId::new("u1").expect("Subject fixture should be valid.");
	let scope = ScopeSet::new(["profile"]).expect("Scope fixture should be valid.");
	let token = core.create_access_token(&subject, role, scope).expect("Signing should succeed.");

	format!("Bearer {token}")
}

fn basic_for(credential: &str) -> String {
	format!("Basic {}", STANDARD.encode(credential))
}

async fn error_body(response: Response<Body>) -> Result<ErrorBody> {
	let bytes = body::to_bytes(response.into_body(), usize::MAX).await?;

	Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn basic_allow_list_admits_known_credentials_only() -> Result<()> {
	let core = build_core(12);
	let app = app(&core);
	let admitted = app.clone().oneshot(request("/internal", Some(&basic_for("admin:admin")))).await?;

	assert_eq!(admitted.status(), StatusCode::OK);

	let mut rejected = request("/internal", Some(&basic_for("admin:wrong")));

	rejected.headers_mut().insert(REQUEST_ID_HEADER, "req-42".parse()?);

	let rejected = app.oneshot(rejected).await?;

	assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(
		rejected.headers().get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()),
		Some("req-42")
	);

	let body = error_body(rejected).await?;

	assert_eq!(body.code, "unauthorized");
	assert_eq!(body.request_id, "req-42");

	Ok(())
}

#[tokio::test]
async fn guest_token_on_admin_route_is_forbidden() -> Result<()> {
	let core = build_core(12);
	let app = app(&core);
	let forbidden =
		app.clone().oneshot(request("/admin", Some(&bearer_for(&core, Role::GUEST)))).await?;

	assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

	let body = error_body(forbidden).await?;

	assert_eq!(body.code, "forbidden");
	assert!(!body.error.contains("guest"), "Rejections must not name the failing role.");
	assert!(!body.request_id.is_empty());

	let admitted =
		app.clone().oneshot(request("/admin", Some(&bearer_for(&core, Role::ADMIN)))).await?;

	assert_eq!(admitted.status(), StatusCode::OK);
	assert!(admitted.headers().contains_key(REQUEST_ID_HEADER));

	let subject = body::to_bytes(admitted.into_body(), usize::MAX).await?;

	assert_eq!(&subject[..], b"u1");

	let anonymous = app.oneshot(request("/admin", None)).await?;

	assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

	Ok(())
}

#[tokio::test]
async fn tampered_and_foreign_tokens_share_one_public_message() -> Result<()> {
	let core = build_core(12);
	let app = app(&core);
	let mut tampered = bearer_for(&core, Role::ADMIN);

	tampered.push('x');

	let tampered = error_body(app.clone().oneshot(request("/admin", Some(&tampered))).await?).await?;
	let garbage =
		error_body(app.oneshot(request("/admin", Some("Bearer undefined"))).await?).await?;

	assert_eq!(tampered.code, "unauthorized");
	assert_eq!(tampered.error, garbage.error);

	Ok(())
}

#[tokio::test]
async fn exhausted_budget_is_answered_with_429() -> Result<()> {
	let core = build_core(1);
	let app = app(&core);

	assert_eq!(app.clone().oneshot(request("/public", None)).await?.status(), StatusCode::OK);

	let throttled = app.clone().oneshot(request("/public", None)).await?;

	assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
	assert_eq!(error_body(throttled).await?.code, "too_many_requests");

	let other_client = Request::builder()
		.uri("/public")
		.header("x-forwarded-for", "198.51.100.23")
		.body(Body::empty())?;

	assert_eq!(app.oneshot(other_client).await?.status(), StatusCode::OK);

	Ok(())
}

#[tokio::test]
async fn spoofed_forwarding_headers_share_the_peer_budget() -> Result<()> {
	let core = build_core_with_trust(1, false);
	let app = app(&core);
	let peer = SocketAddr::from(([198, 51, 100, 9], 40_000));
	let mut statuses = Vec::new();

	for i in 0..10 {
		let mut request = Request::builder()
			.uri("/public")
			.header("x-forwarded-for", format!("203.0.113.{i}"))
			.header("x-real-ip", format!("192.0.2.{i}"))
			.body(Body::empty())?;

		request.extensions_mut().insert(ConnectInfo(peer));
		statuses.push(app.clone().oneshot(request).await?.status());
	}

	assert_eq!(statuses.iter().filter(|status| **status == StatusCode::OK).count(), 1);
	assert!(statuses[1..].iter().all(|status| *status == StatusCode::TOO_MANY_REQUESTS));

	let mut other_peer = Request::builder().uri("/public").body(Body::empty())?;

	other_peer.extensions_mut().insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 10], 40_000))));

	assert_eq!(app.oneshot(other_peer).await?.status(), StatusCode::OK);

	Ok(())
}
