// crates.io
use httpmock::prelude::*;
// self
use token_lifecycle::{
	_preludet::*,
	auth::TokenPhase,
	clock::{Clock, ManualClock},
	error::{NetworkError, ServerError},
	provider::PathLayout,
};

#[tokio::test]
async fn acquire_sends_password_grant_and_pins_layout() {
	let server = MockServer::start_async().await;
	let clock = Arc::new(ManualClock::starting_now());
	let manager = build_reqwest_test_manager(
		test_provider(&server.base_url(), &[PathLayout::Modern, PathLayout::Legacy]),
		test_config(),
		clock.clone(),
	);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(MODERN_TOKEN_PATH)
				.header("content-type", "application/x-www-form-urlencoded")
				.body_includes("grant_type=password")
				.body_includes("username=gateway")
				.body_includes("password=hunter2")
				.body_includes("client_id=sms-gateway")
				.body_includes("client_secret=gateway-secret")
				.body_includes("scope=openid+profile+email");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 300));
		})
		.await;

	manager.acquire().await.expect("Password grant should succeed.");

	let info = manager.token_info();

	assert_eq!(info.phase, TokenPhase::Valid);
	assert!(info.has_refresh_token);
	assert_eq!(info.expires_at, Some(clock.now() + Duration::seconds(300)));
	assert_eq!(info.token_endpoint.as_ref().map(Url::path), Some(MODERN_TOKEN_PATH));

	let token = manager.valid_token().await.expect("Fresh token should be served.");

	assert_eq!(token.expose(), "access-1");
	assert_eq!(manager.metrics().password_grants(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn acquire_falls_back_to_legacy_layout_and_pins_it() {
	let server = MockServer::start_async().await;
	let manager = build_reqwest_test_manager(
		test_provider(&server.base_url(), &[PathLayout::Modern, PathLayout::Legacy]),
		test_config(),
		Arc::new(ManualClock::starting_now()),
	);
	let modern = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH);
			then.status(404)
				.header("content-type", "application/json")
				.body("{\"error\":\"Unable to find matching target resource method\"}");
		})
		.await;
	let legacy = server
		.mock_async(|when, then| {
			when.method(POST).path(LEGACY_TOKEN_PATH).body_includes("grant_type=password");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("legacy-access", Some("legacy-refresh"), 600));
		})
		.await;

	manager.acquire().await.expect("Legacy layout should answer.");
	manager.acquire().await.expect("Pinned legacy layout should answer again.");

	modern.assert_calls_async(1).await;
	legacy.assert_calls_async(2).await;

	assert_eq!(
		manager.token_info().token_endpoint.as_ref().map(Url::path),
		Some(LEGACY_TOKEN_PATH)
	);
	assert_eq!(manager.metrics().password_grants(), 3);
	assert_eq!(manager.metrics().failures(), 1);
}

#[tokio::test]
async fn credential_rejection_wins_over_later_layout_errors() {
	let server = MockServer::start_async().await;
	let manager = build_reqwest_test_manager(
		test_provider(&server.base_url(), &[PathLayout::Modern, PathLayout::Legacy]),
		test_config(),
		Arc::new(ManualClock::starting_now()),
	);

	server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH);
			then.status(401).header("content-type", "application/json").body(
				"{\"error\":\"invalid_grant\",\"error_description\":\"Invalid user credentials\"}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(LEGACY_TOKEN_PATH);
			then.status(404).body("Not Found");
		})
		.await;

	let err = manager.acquire().await.expect_err("Rejected credentials must fail.");

	match err {
		Error::InvalidCredentials { reason } => assert_eq!(reason, "Invalid user credentials"),
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let info = manager.token_info();

	assert_eq!(info.phase, TokenPhase::Empty);
	assert!(info.token_endpoint.is_none(), "Failed probes must not pin a layout.");
}

#[tokio::test]
async fn failed_acquire_keeps_existing_tokens() {
	let server = MockServer::start_async().await;
	let manager = build_reqwest_test_manager(
		test_provider(&server.base_url(), &[PathLayout::Modern]),
		test_config(),
		Arc::new(ManualClock::starting_now()),
	);
	let success = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 3600));
		})
		.await;

	manager.acquire().await.expect("Initial password grant should succeed.");
	success.delete_async().await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH);
			then.status(503).body("<html>Service Unavailable</html>");
		})
		.await;

	let err = manager.acquire().await.expect_err("Provider outage must fail the grant.");

	assert!(err.is_retryable(), "Server errors should be retryable: {err:?}.");
	assert!(matches!(err, Error::Server(ServerError::TokenEndpoint { status: Some(503), .. })));

	let token = manager.valid_token().await.expect("Existing token should survive.");

	assert_eq!(token.expose(), "access-1");
}

#[tokio::test]
async fn missing_lifetime_uses_default_and_malformed_payloads_fail() {
	let server = MockServer::start_async().await;
	let manager = build_reqwest_test_manager(
		test_provider(&server.base_url(), &[PathLayout::Modern]),
		test_config(),
		Arc::new(ManualClock::starting_now()),
	);
	let no_lifetime = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-1\",\"token_type\":\"Bearer\"}");
		})
		.await;

	manager.acquire().await.expect("Token response without expires_in should be accepted.");

	assert_eq!(manager.token_info().expires_in, Some(Duration::hours(1)));

	no_lifetime.delete_async().await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body("{\"oops\":true}");
		})
		.await;

	let err = manager.acquire().await.expect_err("Malformed payloads must fail.");

	assert!(matches!(err, Error::Server(ServerError::TokenResponseParse { .. })));
}

#[tokio::test]
async fn unrepresentable_lifetime_is_rejected_without_touching_state() {
	let server = MockServer::start_async().await;
	let manager = build_reqwest_test_manager(
		test_provider(&server.base_url(), &[PathLayout::Modern]),
		test_config(),
		Arc::new(ManualClock::starting_now()),
	);

	server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 1_000_000_000_000));
		})
		.await;

	let err = manager.acquire().await.expect_err("Out-of-range lifetimes must fail the grant.");

	assert!(
		matches!(err, Error::Server(ServerError::InvalidExpiresIn { seconds: 1_000_000_000_000 })),
		"{err:?}"
	);
	assert_eq!(manager.token_info().phase, TokenPhase::Empty);
	assert!(manager.valid_token().await.is_none());
}

#[tokio::test]
async fn unreachable_provider_surfaces_network_error() {
	let manager = build_reqwest_test_manager(
		test_provider("http://127.0.0.1:9", &[PathLayout::Modern]),
		test_config(),
		Arc::new(ManualClock::starting_now()),
	);
	let err = manager.acquire().await.expect_err("Closed ports must fail the grant.");

	assert!(matches!(err, Error::Network(NetworkError::Connection { .. })), "{err:?}");
	assert_eq!(manager.token_info().phase, TokenPhase::Empty);
}
