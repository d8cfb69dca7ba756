//! Manager settings: renewal buffer, timeouts, retry policy, and request decoration.
//!
//! Every type here deserializes with serde so host services can load it from whatever file
//! format they already use. Durations are expressed as whole seconds.

// self
use crate::{
	_prelude::*,
	auth::Credentials,
	error::ConfigError,
	provider::IdentityProvider,
};

/// Bounded retry policy applied by
/// [`TokenManager::check_and_renew`](crate::manager::TokenManager::check_and_renew).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Total renewal attempts, including the first one.
	pub max_attempts: u32,
	/// Fixed delay between attempts.
	#[serde(with = "seconds")]
	pub delay: Duration,
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_attempts: 3, delay: Duration::seconds(5) }
	}
}

/// Tunables for a [`TokenManager`](crate::manager::TokenManager).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
	/// Margin before expiry at which a token is treated as stale.
	#[serde(with = "seconds")]
	pub renewal_buffer: Duration,
	/// Per-request timeout for the default reqwest transport.
	#[serde(with = "seconds")]
	pub request_timeout: Duration,
	/// Upper bound for the logout call made by
	/// [`TokenManager::shutdown`](crate::manager::TokenManager::shutdown).
	#[serde(with = "seconds")]
	pub logout_timeout: Duration,
	/// Lifetime assumed when the provider omits `expires_in`.
	#[serde(with = "seconds")]
	pub default_expires_in: Duration,
	/// Retry policy for background renewal.
	pub retry: RetryPolicy,
	/// Scopes requested with the password grant.
	pub scopes: Vec<String>,
	/// `User-Agent` sent by the default reqwest transport.
	pub user_agent: String,
}
impl ManagerConfig {
	/// Overrides the renewal buffer.
	pub fn with_renewal_buffer(mut self, buffer: Duration) -> Self {
		self.renewal_buffer = buffer;

		self
	}

	/// Overrides the per-request timeout.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the logout timeout used during shutdown.
	pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
		self.logout_timeout = timeout;

		self
	}

	/// Overrides the background retry policy.
	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Replaces the requested scopes.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the `User-Agent` header.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Rejects values that would make the lifecycle misbehave.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.renewal_buffer.is_negative() {
			return Err(invalid("renewal_buffer", "must not be negative"));
		}
		if !self.request_timeout.is_positive() {
			return Err(invalid("request_timeout", "must be positive"));
		}
		if self.logout_timeout.is_negative() {
			return Err(invalid("logout_timeout", "must not be negative"));
		}
		if !self.default_expires_in.is_positive() {
			return Err(invalid("default_expires_in", "must be positive"));
		}
		if self.retry.max_attempts == 0 {
			return Err(invalid("retry.max_attempts", "must allow at least one attempt"));
		}
		if self.retry.delay.is_negative() {
			return Err(invalid("retry.delay", "must not be negative"));
		}

		Ok(())
	}
}
impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			renewal_buffer: Duration::seconds(60),
			request_timeout: Duration::seconds(30),
			logout_timeout: Duration::seconds(5),
			default_expires_in: Duration::seconds(3600),
			retry: RetryPolicy::default(),
			scopes: vec!["openid".into(), "profile".into(), "email".into()],
			user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
		}
	}
}

/// Everything needed to construct a manager, as loaded from a host service's configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
	/// Identity provider location and endpoint layouts.
	pub provider: IdentityProvider,
	/// Client and resource-owner credentials.
	pub credentials: Credentials,
	/// Lifecycle tunables.
	#[serde(default)]
	pub manager: ManagerConfig,
}
impl Settings {
	/// Validates every section.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.provider.validate()?;
		self.credentials.validate()?;
		self.manager.validate()
	}
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
	ConfigError::InvalidSetting { field, reason }
}

/// Serde adapter storing [`Duration`] values as whole seconds.
pub mod seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	/// Serializes a duration as whole seconds.
	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	/// Deserializes whole seconds into a duration.
	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}
