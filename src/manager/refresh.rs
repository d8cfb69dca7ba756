//! Refresh grant with a single password-grant fallback.

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
	/// Renews the access token.
	///
	/// Without a refresh token this is a password grant. Otherwise the refresh grant runs
	/// first and any failure falls back to one password grant. The held refresh token is only
	/// replaced when the provider rotates it. When both grants fail the held tokens stay in
	/// place and the manager reports [`TokenPhase::Unavailable`](crate::auth::TokenPhase).
	pub async fn refresh(&self) -> Result<()> {
		let _renewal = self.renewal.lock().await;

		self.refresh_locked().await
	}

	/// Refresh body; callers must hold the renewal guard.
	pub(super) async fn refresh_locked(&self) -> Result<()> {
		let result = FlowSpan::new(FlowKind::Refresh, "refresh")
			.observe(self.refresh_or_reacquire(), |result| result.is_ok())
			.await;

		// A cleared session has nothing left to mark.
		if result.as_ref().is_err_and(|err| !matches!(err, Error::SessionEnded)) {
			self.state.lock().mark_renewal_failed();
		}

		self.advance_renewal_epoch();

		result
	}

	async fn refresh_or_reacquire(&self) -> Result<()> {
		let (session, refresh_token) = {
			let state = self.state.lock();

			(state.session(), state.refresh_token())
		};
		let endpoints = self.pinned_endpoints();
		let (Some(refresh_token), Some(endpoints)) = (refresh_token, endpoints) else {
			tracing::debug!("No refresh token held; using the password grant.");

			return self.acquire_locked(session).await;
		};

		match self.refresh_grant(&endpoints, &refresh_token, session).await {
			Ok(()) => Ok(()),
			Err(Error::SessionEnded) => Err(Error::SessionEnded),
			Err(err) => {
				tracing::warn!(
					error = %err,
					"Refresh grant failed; falling back to the password grant."
				);

				self.acquire_locked(session).await
			},
		}
	}

	async fn refresh_grant(
		&self,
		endpoints: &Endpoints,
		refresh_token: &Secret,
		session: u64,
	) -> Result<()> {
		self.metrics.record_refresh_grant();

		let facade = self.facade(endpoints)?;
		let issued_at = self.now();
		let next = facade
			.exchange_refresh_token(self.strategy.as_ref(), refresh_token, issued_at)
			.await
			.inspect_err(|_| self.metrics.record_failure())?;

		self.install(session, |current| match current {
			Some(current) => current.clone().rotated(next),
			None => next,
		})
	}
}
