//! Manager-level error types shared by grants, transports, and provider strategies.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by token exchanges.
///
/// Request-path helpers such as
/// [`TokenManager::valid_token`](crate::manager::TokenManager::valid_token) never surface these
/// values; they log the reason and report an absent token instead.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identity provider failed or answered with an unusable payload; retry with backoff.
	#[error(transparent)]
	Server(#[from] ServerError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Network(#[from] NetworkError),

	/// Provider rejected the username/password or client credentials.
	#[error("Identity provider rejected the credentials: {reason}.")]
	InvalidCredentials {
		/// Provider- or manager-supplied reason string.
		reason: String,
	},
	/// Provider rejected the refresh token.
	#[error("Identity provider rejected the refresh token: {reason}.")]
	RefreshRejected {
		/// Provider- or manager-supplied reason string.
		reason: String,
	},
	/// Provider answered with a status outside the known taxonomy (e.g. 404 for a wrong layout).
	#[error("Identity provider answered with HTTP {status}: {reason}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Provider- or manager-supplied reason string.
		reason: String,
	},
	/// Logout or shutdown ended the session while the grant was in flight; its tokens were
	/// discarded.
	#[error("Session ended before the grant completed.")]
	SessionEnded,
}
impl Error {
	/// Returns `true` when repeating the same request may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Server(_) | Self::Network(_))
	}

	/// Returns `true` when the provider refused the password grant.
	pub fn is_credential_rejection(&self) -> bool {
		matches!(self, Self::InvalidCredentials { .. })
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A resolved endpoint is not a valid URL.
	#[error("Endpoint `{url}` is not a valid URL.")]
	InvalidEndpoint {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A manager setting holds an unusable value.
	#[error("Setting `{field}` {reason}.")]
	InvalidSetting {
		/// Offending field path.
		field: &'static str,
		/// Why the value was rejected.
		reason: &'static str,
	},
	/// Identity provider descriptor failed validation.
	#[error(transparent)]
	Provider(#[from] crate::provider::IdentityProviderError),
	/// A configured identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Upstream failures that are safe to retry.
#[derive(Debug, ThisError)]
pub enum ServerError {
	/// Provider returned a server-side failure or an unexpected but non-fatal response.
	#[error("Identity provider returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or manager-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint reported a lifetime the manager cannot use.
	#[error("Token endpoint returned an unusable expires_in of {seconds} seconds.")]
	InvalidExpiresIn {
		/// Raw value reported by the provider.
		seconds: u64,
	},
}

/// Transport-level failures (connection, I/O, timeout).
#[derive(Debug, ThisError)]
pub enum NetworkError {
	/// Underlying HTTP client reported a connection failure.
	#[error("Network error occurred while calling the identity provider.")]
	Connection {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded the configured timeout.
	#[error("Request to the identity provider timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the identity provider.")]
	Io(#[from] std::io::Error),
}
impl NetworkError {
	/// Wraps a transport-specific network error.
	pub fn connection(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Connection { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for NetworkError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::connection(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retryable_covers_server_and_network_only() {
		let server =
			Error::from(ServerError::TokenEndpoint { message: "boom".into(), status: Some(503) });
		let network = Error::from(NetworkError::Timeout);
		let rejected = Error::InvalidCredentials { reason: "bad password".into() };
		let refresh = Error::RefreshRejected { reason: "expired".into() };
		let unexpected = Error::UnexpectedStatus { status: 404, reason: "not found".into() };

		assert!(server.is_retryable());
		assert!(network.is_retryable());
		assert!(!rejected.is_retryable());
		assert!(!refresh.is_retryable());
		assert!(!unexpected.is_retryable());
		assert!(rejected.is_credential_rejection());
		assert!(!refresh.is_credential_rejection());
	}

	#[test]
	fn messages_do_not_leak_context_beyond_reason() {
		let err = Error::UnexpectedStatus {
			status: 404,
			reason: "Unable to find matching target resource method".into(),
		};

		assert_eq!(
			err.to_string(),
			"Identity provider answered with HTTP 404: Unable to find matching target resource method."
		);
	}
}
