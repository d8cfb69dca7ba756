//! Resource-owner password grant with endpoint layout probing.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::TokenHttpClient,
	manager::TokenManager,
	oauth::TransportErrorMapper,
	obs::{FlowKind, FlowSpan},
	provider::{Endpoints, IdentityProviderError},
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs the password grant and replaces the held tokens on success.
	///
	/// Until a login succeeds, every configured layout is tried in order and the first one that
	/// answers pins its endpoints for all later calls. When every layout fails, the first
	/// credential rejection wins over other errors since it is the most actionable one.
	/// Failures never touch the held tokens.
	pub async fn acquire(&self) -> Result<()> {
		let _renewal = self.renewal.lock().await;
		let result = self.acquire_locked(self.session()).await;

		self.advance_renewal_epoch();

		result
	}

	/// Password grant body for an operation that started in `session`; callers must hold the
	/// renewal guard.
	pub(super) async fn acquire_locked(&self, session: u64) -> Result<()> {
		FlowSpan::new(FlowKind::Acquire, "acquire")
			.observe(self.probe_password_grant(session), |result| result.is_ok())
			.await
	}

	async fn probe_password_grant(&self, session: u64) -> Result<()> {
		let candidates = match self.pinned_endpoints() {
			Some(endpoints) => vec![endpoints],
			None => self.provider.candidates()?,
		};
		let mut rejection = None;
		let mut last_error = None;

		for endpoints in candidates {
			match self.password_grant(&endpoints, session).await {
				Ok(()) => {
					self.pin(&endpoints);

					return Ok(());
				},
				Err(Error::SessionEnded) => return Err(Error::SessionEnded),
				Err(err) => {
					tracing::warn!(
						token_endpoint = %endpoints.token,
						error = %err,
						"Password grant failed."
					);

					if rejection.is_none() && err.is_credential_rejection() {
						rejection = Some(err);
					} else {
						last_error = Some(err);
					}
				},
			}
		}

		Err(rejection
			.or(last_error)
			.unwrap_or_else(|| ConfigError::from(IdentityProviderError::NoLayouts).into()))
	}

	async fn password_grant(&self, endpoints: &Endpoints, session: u64) -> Result<()> {
		self.metrics.record_password_grant();

		let facade = self.facade(endpoints)?;
		let issued_at = self.now();
		let tokens = facade
			.exchange_password(self.strategy.as_ref(), issued_at)
			.await
			.inspect_err(|_| self.metrics.record_failure())?;

		self.install(session, |_| tokens)
	}
}
