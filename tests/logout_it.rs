// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
// self
use token_lifecycle::{_preludet::*, auth::TokenPhase, clock::ManualClock, provider::PathLayout};

async fn logged_in_manager(server: &MockServer) -> ReqwestTestManager {
	let manager = build_reqwest_test_manager(
		test_provider(&server.base_url(), &[PathLayout::Modern]),
		test_config(),
		Arc::new(ManualClock::starting_now()),
	);

	server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH).body_includes("grant_type=password");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 3600));
		})
		.await;
	manager.acquire().await.expect("Password grant should succeed.");

	manager
}

#[tokio::test]
async fn logout_posts_refresh_token_and_clears_state() {
	let server = MockServer::start_async().await;
	let manager = logged_in_manager(&server).await;
	let logout = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(MODERN_LOGOUT_PATH)
				.header("content-type", "application/x-www-form-urlencoded")
				.body_includes("client_id=sms-gateway")
				.body_includes("client_secret=gateway-secret")
				.body_includes("refresh_token=refresh-1");
			then.status(204);
		})
		.await;

	assert!(manager.logout().await);
	logout.assert_calls_async(1).await;
	assert_eq!(manager.token_info().phase, TokenPhase::Empty);
	assert!(!manager.token_info().has_refresh_token);
	assert_eq!(manager.metrics().logouts(), 1);
}

#[tokio::test]
async fn logout_without_session_sends_nothing() {
	let server = MockServer::start_async().await;
	let manager = build_reqwest_test_manager(
		test_provider(&server.base_url(), &[PathLayout::Modern]),
		test_config(),
		Arc::new(ManualClock::starting_now()),
	);
	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_LOGOUT_PATH);
			then.status(204);
		})
		.await;

	assert!(manager.logout().await);
	logout.assert_calls_async(0).await;
	assert_eq!(manager.metrics().logouts(), 0);
}

#[tokio::test]
async fn rejected_logout_is_logged_but_not_fatal() {
	let server = MockServer::start_async().await;
	let manager = logged_in_manager(&server).await;
	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_LOGOUT_PATH);
			then.status(500).body("boom");
		})
		.await;

	assert!(manager.logout().await, "Provider refusals must not fail the logout.");
	logout.assert_calls_async(1).await;
	assert_eq!(manager.token_info().phase, TokenPhase::Empty);
	assert_eq!(manager.metrics().failures(), 1);

	// Nothing is left to end, so a second logout is a local no-op.
	assert!(manager.logout().await);
	logout.assert_calls_async(1).await;
}

#[tokio::test]
async fn shutdown_is_bounded_by_the_timeout() {
	let server = MockServer::start_async().await;
	let manager = logged_in_manager(&server).await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_LOGOUT_PATH);
			then.status(204).delay(StdDuration::from_secs(3));
		})
		.await;

	let started = std::time::Instant::now();

	assert!(!manager.shutdown_within(Duration::milliseconds(200)).await);
	assert!(started.elapsed() < StdDuration::from_secs(2));
	assert_eq!(manager.token_info().phase, TokenPhase::Empty);
	assert!(manager.valid_token().await.is_some(), "A new login should still be possible.");
}

#[tokio::test]
async fn unreachable_logout_endpoint_still_clears_state() {
	let server = MockServer::start_async().await;
	let layout = PathLayout::Custom {
		token: Url::parse(&server.url(MODERN_TOKEN_PATH)).expect("Token URL should parse."),
		logout: Url::parse("http://127.0.0.1:9/logout").expect("Logout URL should parse."),
	};
	let manager = build_reqwest_test_manager(
		test_provider(&server.base_url(), &[layout]),
		test_config(),
		Arc::new(ManualClock::starting_now()),
	);

	server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH).body_includes("grant_type=password");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 3600));
		})
		.await;
	manager.acquire().await.expect("Password grant should succeed.");

	assert!(!manager.logout().await, "Connection refused must be reported as a failed logout.");
	assert_eq!(manager.token_info().phase, TokenPhase::Empty);
	assert_eq!(manager.metrics().failures(), 1);
}

#[tokio::test]
async fn renewal_in_flight_cannot_outlive_shutdown() {
	let server = MockServer::start_async().await;
	let manager = Arc::new(build_reqwest_test_manager(
		test_provider(&server.base_url(), &[PathLayout::Modern]),
		test_config(),
		Arc::new(ManualClock::starting_now()),
	));
	let password = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH).body_includes("grant_type=password");
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(500))
				.body(token_body("access-1", Some("refresh-1"), 3600));
		})
		.await;
	let renewal = {
		let manager = Arc::clone(&manager);

		tokio::spawn(async move { manager.valid_token().await })
	};

	// Let the renewal take the guard and send its request.
	tokio::time::sleep(StdDuration::from_millis(100)).await;

	assert!(!manager.shutdown_within(Duration::milliseconds(100)).await);

	let token = renewal.await.expect("Renewal task should not panic.");

	assert!(token.is_none(), "A grant that outlived shutdown must not hand out its token.");
	password.assert_calls_async(1).await;
	assert_eq!(manager.token_info().phase, TokenPhase::Empty);
	assert_eq!(manager.metrics().logouts(), 0);
}
