//! Request-path accessors: valid tokens, bearer headers, and diagnostic snapshots.

// self
use crate::{
	_prelude::*,
	auth::{AuthorizationHeader, Secret, TokenInfo},
	http::TokenHttpClient,
	manager::TokenManager,
	oauth::TransportErrorMapper,
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns an access token that lies outside the renewal buffer, or `None`.
	///
	/// A fresh token is returned without touching the network. Otherwise exactly one renewal
	/// attempt is made. Callers that arrive while another renewal is in flight wait for it and
	/// share its outcome instead of starting their own. Failures are logged, never raised.
	pub async fn valid_token(&self) -> Option<Secret> {
		if let Some(token) = self.fresh_token() {
			return Some(token);
		}

		let observed_epoch = self.renewal_epoch();
		let _renewal = self.renewal.lock().await;

		if let Some(token) = self.fresh_token() {
			return Some(token);
		}
		if self.renewal_epoch() != observed_epoch {
			tracing::debug!("Concurrent renewal finished without a usable token.");

			return None;
		}

		match self.refresh_locked().await {
			Ok(()) => self.fresh_token().or_else(|| {
				tracing::warn!("Renewed token already lies inside the renewal buffer.");

				None
			}),
			Err(err) => {
				tracing::warn!(error = %err, "Token renewal failed; no token available.");

				None
			},
		}
	}

	/// Returns `Authorization: Bearer <token>` for a valid token, or `None`.
	pub async fn authorization_header(&self) -> Option<AuthorizationHeader> {
		self.valid_token().await.map(AuthorizationHeader::bearer)
	}

	/// Returns a secret-free snapshot of the held tokens.
	pub fn token_info(&self) -> TokenInfo {
		let token_endpoint = self.pinned_endpoints().map(|endpoints| endpoints.token);
		let now = self.now();

		self.state.lock().info(now, self.config.renewal_buffer, token_endpoint)
	}
}
