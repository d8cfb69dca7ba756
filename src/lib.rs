//! Thread-safe bearer token lifecycle manager for Keycloak-style OAuth 2.0 identity providers:
//! password and refresh grants, single-flight renewal, bounded retries, and best-effort logout.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod oauth;
pub mod obs;
pub mod provider;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Credentials, Realm},
		clock::{Clock, ManualClock},
		config::{ManagerConfig, RetryPolicy},
		http::ReqwestHttpClient,
		manager::ReqwestTokenManager,
		oauth::ReqwestTransportErrorMapper,
		provider::{DefaultProviderStrategy, IdentityProvider, PathLayout},
	};

	/// Manager type alias used by reqwest-backed integration tests.
	pub type ReqwestTestManager = ReqwestTokenManager;

	/// Realm served by every mock identity provider.
	pub const TEST_REALM: &str = "sr";
	/// Client identifier used by the test credentials.
	pub const TEST_CLIENT_ID: &str = "sms-gateway";
	/// Client secret used by the test credentials.
	pub const TEST_CLIENT_SECRET: &str = "gateway-secret";
	/// Username used by the test credentials.
	pub const TEST_USERNAME: &str = "gateway";
	/// Password used by the test credentials.
	pub const TEST_PASSWORD: &str = "hunter2";
	/// Token endpoint path for the modern layout of [`TEST_REALM`].
	pub const MODERN_TOKEN_PATH: &str = "/realms/sr/protocol/openid-connect/token";
	/// Logout endpoint path for the modern layout of [`TEST_REALM`].
	pub const MODERN_LOGOUT_PATH: &str = "/realms/sr/protocol/openid-connect/logout";
	/// Token endpoint path for the legacy layout of [`TEST_REALM`].
	pub const LEGACY_TOKEN_PATH: &str = "/auth/realms/sr/protocol/openid-connect/token";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(std::time::Duration::from_secs(5))
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Credentials shared by the integration tests.
	pub fn test_credentials() -> Credentials {
		Credentials::new(TEST_CLIENT_ID, TEST_USERNAME, TEST_PASSWORD)
			.expect("Test client identifier should be valid.")
			.with_client_secret(TEST_CLIENT_SECRET)
	}

	/// Identity provider rooted at `base_url` with the given layout preference.
	pub fn test_provider(base_url: &str, layouts: &[PathLayout]) -> IdentityProvider {
		IdentityProvider::builder(
			Url::parse(base_url).expect("Mock provider base URL should parse."),
			Realm::new(TEST_REALM).expect("Test realm should be valid."),
		)
		.layouts(layouts.iter().cloned())
		.build()
		.expect("Mock identity provider should build.")
	}

	/// Manager settings tuned for tests: no delay between retries.
	pub fn test_config() -> ManagerConfig {
		ManagerConfig::default()
			.with_retry(RetryPolicy { max_attempts: 3, delay: Duration::ZERO })
	}

	/// Constructs a manager against `provider` that reads time from `clock`.
	pub fn build_reqwest_test_manager(
		provider: IdentityProvider,
		config: ManagerConfig,
		clock: Arc<ManualClock>,
	) -> ReqwestTestManager {
		let clock: Arc<dyn Clock> = clock;

		ReqwestTestManager::with_http_client(
			provider,
			test_credentials(),
			config,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_strategy(Arc::new(DefaultProviderStrategy))
		.with_clock(clock)
	}

	/// JSON body of a successful token response.
	pub fn token_body(access: &str, refresh: Option<&str>, expires_in: u64) -> String {
		match refresh {
			Some(refresh) => format!(
				"{{\"access_token\":\"{access}\",\"refresh_token\":\"{refresh}\",\"token_type\":\"Bearer\",\"expires_in\":{expires_in}}}"
			),
			None => format!(
				"{{\"access_token\":\"{access}\",\"token_type\":\"Bearer\",\"expires_in\":{expires_in}}}"
			),
		}
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
