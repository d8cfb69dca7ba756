// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
// self
use token_lifecycle::{
	_preludet::*, auth::TokenPhase, clock::ManualClock, config::RetryPolicy, provider::PathLayout,
};

fn manager_with(
	server: &MockServer,
	clock: Arc<ManualClock>,
	retry: RetryPolicy,
) -> ReqwestTestManager {
	build_reqwest_test_manager(
		test_provider(&server.base_url(), &[PathLayout::Modern]),
		test_config().with_renewal_buffer(Duration::seconds(300)).with_retry(retry),
		clock,
	)
}

fn fast_retries() -> RetryPolicy {
	RetryPolicy { max_attempts: 3, delay: Duration::ZERO }
}

#[tokio::test]
async fn check_and_renew_is_a_no_op_while_fresh() {
	let server = MockServer::start_async().await;
	let manager = manager_with(&server, Arc::new(ManualClock::starting_now()), fast_retries());
	let password = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH).body_includes("grant_type=password");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 3600));
		})
		.await;

	manager.check_and_renew().await.expect("Initial renewal should acquire a token.");
	manager.check_and_renew().await.expect("Fresh tokens need no renewal.");

	password.assert_calls_async(1).await;
	assert_eq!(manager.token_info().phase, TokenPhase::Valid);
}

#[tokio::test]
async fn check_and_renew_refreshes_stale_tokens() {
	let server = MockServer::start_async().await;
	let clock = Arc::new(ManualClock::starting_now());
	let manager = manager_with(&server, clock.clone(), fast_retries());

	server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH).body_includes("grant_type=password");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 3600));
		})
		.await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(MODERN_TOKEN_PATH)
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=refresh-1");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-2", Some("refresh-2"), 3600));
		})
		.await;

	manager.acquire().await.expect("Password grant should succeed.");
	clock.advance(Duration::seconds(3500));

	assert_eq!(manager.token_info().phase, TokenPhase::Stale);

	manager.check_and_renew().await.expect("Stale token should be refreshed.");

	refresh.assert_calls_async(1).await;
	assert_eq!(
		manager.valid_token().await.expect("Refreshed token should be valid.").expose(),
		"access-2"
	);
}

#[tokio::test]
async fn check_and_renew_gives_up_after_max_attempts() {
	let server = MockServer::start_async().await;
	let manager = manager_with(&server, Arc::new(ManualClock::starting_now()), fast_retries());
	let outage = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH);
			then.status(503).body("maintenance");
		})
		.await;
	let err = manager.check_and_renew().await.expect_err("Every attempt should fail.");

	assert!(err.is_retryable(), "Unexpected error: {err:?}");
	outage.assert_calls_async(3).await;
	assert_eq!(manager.metrics().password_grants(), 3);
	assert_eq!(manager.token_info().phase, TokenPhase::Empty);
}

#[tokio::test]
async fn rejected_credentials_are_not_retried() {
	let server = MockServer::start_async().await;
	let manager = manager_with(&server, Arc::new(ManualClock::starting_now()), fast_retries());
	let rejected = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH).body_includes("grant_type=password");
			then.status(401)
				.header("content-type", "application/json")
				.body(concat!(
					r#"{"error":"invalid_grant","#,
					r#""error_description":"Invalid user credentials"}"#
				));
		})
		.await;
	let err = manager.check_and_renew().await.expect_err("Rejected credentials must fail.");

	assert!(err.is_credential_rejection(), "Unexpected error: {err:?}");
	rejected.assert_calls_async(1).await;
	assert_eq!(manager.metrics().password_grants(), 1);
}

#[tokio::test]
async fn retry_delay_does_not_block_request_path() {
	let server = MockServer::start_async().await;
	let manager = Arc::new(manager_with(
		&server,
		Arc::new(ManualClock::starting_now()),
		RetryPolicy { max_attempts: 2, delay: Duration::seconds(10) },
	));
	let outage = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH);
			then.status(503).body("maintenance");
		})
		.await;
	let background = {
		let manager = Arc::clone(&manager);

		tokio::spawn(async move { manager.check_and_renew().await })
	};

	// Let the first attempt fail so the task is parked in its retry delay.
	tokio::time::sleep(StdDuration::from_millis(300)).await;
	outage.assert_calls_async(1).await;
	outage.delete_async().await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH).body_includes("grant_type=password");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 3600));
		})
		.await;

	let token = tokio::time::timeout(StdDuration::from_secs(2), manager.valid_token())
		.await
		.expect("Request path must not wait for the retry delay.")
		.expect("Provider recovered, so a token should be issued.");

	assert_eq!(token.expose(), "access-1");
	assert!(!background.is_finished());

	background.abort();
}

#[tokio::test]
async fn background_renewal_acquires_and_stops() {
	let server = MockServer::start_async().await;
	let manager =
		Arc::new(manager_with(&server, Arc::new(ManualClock::starting_now()), fast_retries()));
	let password = server
		.mock_async(|when, then| {
			when.method(POST).path(MODERN_TOKEN_PATH).body_includes("grant_type=password");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 3600));
		})
		.await;
	let task = manager.spawn_renewal(Duration::seconds(60));

	tokio::time::timeout(StdDuration::from_secs(5), async {
		while manager.token_info().phase != TokenPhase::Valid {
			tokio::time::sleep(StdDuration::from_millis(20)).await;
		}
	})
	.await
	.expect("Background renewal should acquire a token.");

	assert!(!task.is_finished());

	tokio::time::timeout(StdDuration::from_secs(2), task.stop())
		.await
		.expect("Stopping the loop should not wait for the next period.");

	password.assert_calls_async(1).await;
}
