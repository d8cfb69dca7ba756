//! Best-effort session termination and orderly shutdown.

// self
use crate::{
	_prelude::*,
	auth::Secret,
	http::TokenHttpClient,
	manager::TokenManager,
	oauth::TransportErrorMapper,
	obs::{FlowKind, FlowSpan},
	provider::Endpoints,
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Ends the provider session and clears local state.
	///
	/// Local state is cleared before the request goes out, so it is gone regardless of the
	/// outcome (or of this future being dropped). Returns `false` only when the request never
	/// got an answer; any HTTP status, or having no session to end, yields `true`. Unexpected
	/// statuses and transport failures are logged, never raised.
	pub async fn logout(&self) -> bool {
		FlowSpan::new(FlowKind::Logout, "logout").observe(self.end_session(), |ended| *ended).await
	}

	/// Runs [`logout`](Self::logout) bounded by [`ManagerConfig::logout_timeout`].
	///
	/// [`ManagerConfig::logout_timeout`]: crate::config::ManagerConfig::logout_timeout
	pub async fn shutdown(&self) -> bool {
		self.shutdown_within(self.config.logout_timeout).await
	}

	/// Runs [`logout`](Self::logout) bounded by `timeout`; local state is cleared even when the
	/// provider does not answer in time.
	pub async fn shutdown_within(&self, timeout: Duration) -> bool {
		match tokio::time::timeout(timeout.unsigned_abs(), self.logout()).await {
			Ok(ended) => ended,
			Err(_) => {
				tracing::warn!(timeout = %timeout, "Logout did not finish in time.");

				self.state.lock().clear();

				false
			},
		}
	}

	async fn end_session(&self) -> bool {
		let _renewal = self.renewal.lock().await;
		let refresh_token = {
			let mut state = self.state.lock();
			let refresh_token = state.refresh_token();

			state.clear();

			refresh_token
		};

		self.advance_renewal_epoch();

		match (refresh_token, self.pinned_endpoints()) {
			(Some(refresh_token), Some(endpoints)) =>
				self.post_logout(&endpoints, &refresh_token).await,
			_ => {
				tracing::debug!("No provider session to end.");

				true
			},
		}
	}

	async fn post_logout(&self, endpoints: &Endpoints, refresh_token: &Secret) -> bool {
		self.metrics.record_logout();

		let result = match self.facade(endpoints) {
			Ok(facade) => facade.end_session(refresh_token).await,
			Err(err) => Err(err),
		};

		match result {
			Ok(200 | 204) => {
				tracing::info!(logout_endpoint = %endpoints.logout, "Provider session ended.");

				true
			},
			// Local state is already gone; the provider's refusal only affects its own session.
			Ok(status) => {
				self.metrics.record_failure();
				tracing::warn!(status, "Logout endpoint answered with an unexpected status.");

				true
			},
			Err(err) => {
				self.metrics.record_failure();
				tracing::warn!(error = %err, "Logout request failed.");

				false
			},
		}
	}
}
