//! Bounded renewal with retries and the background supervisory loop.

// crates.io
use tokio::{sync::watch, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	http::TokenHttpClient,
	manager::TokenManager,
	oauth::TransportErrorMapper,
	obs::{FlowKind, FlowSpan},
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Renews the token if it is stale or absent, retrying per [`RetryPolicy`].
	///
	/// Returns `Ok(())` immediately while the held token is fresh. The renewal guard is released
	/// while sleeping between attempts, so request-path callers are never blocked by the retry
	/// delay. Errors that a retry cannot fix, such as rejected credentials, end the loop at
	/// once; otherwise the last error is returned once every attempt has failed.
	///
	/// [`RetryPolicy`]: crate::config::RetryPolicy
	pub async fn check_and_renew(&self) -> Result<()> {
		FlowSpan::new(FlowKind::Renew, "check_and_renew")
			.observe(self.renew_with_retries(), |result| result.is_ok())
			.await
	}

	async fn renew_with_retries(&self) -> Result<()> {
		let policy = self.config.retry;
		let mut attempt = 1;

		loop {
			let outcome = {
				let _renewal = self.renewal.lock().await;

				if self.fresh_token().is_some() {
					return Ok(());
				}

				self.refresh_locked().await
			};

			match outcome {
				Ok(()) => return Ok(()),
				Err(err) if !err.is_retryable() => {
					tracing::error!(
						attempts = attempt,
						error = %err,
						"Token renewal stopped on a non-retryable error."
					);

					return Err(err);
				},
				Err(err) if attempt >= policy.max_attempts => {
					tracing::error!(attempts = attempt, error = %err, "Token renewal gave up.");

					return Err(err);
				},
				Err(err) => {
					tracing::warn!(
						attempt,
						max_attempts = policy.max_attempts,
						error = %err,
						"Token renewal attempt failed; retrying."
					);

					attempt += 1;

					tokio::time::sleep(policy.delay.unsigned_abs()).await;
				},
			}
		}
	}
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Spawns a tokio task that runs [`check_and_renew`](Self::check_and_renew) every
	/// `interval` until the returned handle is stopped or dropped.
	///
	/// The first check runs immediately. Failures are logged and the loop keeps going.
	pub fn spawn_renewal(self: &Arc<Self>, interval: Duration) -> RenewalTask {
		let (stop, mut stopped) = watch::channel(false);
		let manager = Arc::clone(self);
		let period = interval.unsigned_abs();
		let handle = tokio::spawn(async move {
			loop {
				if let Err(err) = manager.check_and_renew().await {
					tracing::error!(error = %err, "Background token renewal failed.");
				}

				// Either a stop signal or a dropped handle ends the loop.
				if tokio::time::timeout(period, stopped.changed()).await.is_ok() {
					break;
				}
			}

			tracing::debug!("Background token renewal stopped.");
		});

		RenewalTask { stop, handle }
	}
}

/// Handle to the background renewal loop started by [`TokenManager::spawn_renewal`].
///
/// Dropping the handle also stops the loop, after any in-flight check completes.
#[derive(Debug)]
pub struct RenewalTask {
	stop: watch::Sender<bool>,
	handle: JoinHandle<()>,
}
impl RenewalTask {
	/// Signals the loop to stop and waits for it to exit.
	pub async fn stop(self) {
		// The loop may already be gone, in which case nobody is listening.
		let _ = self.stop.send(true);

		if let Err(err) = self.handle.await {
			tracing::error!(error = %err, "Background token renewal task ended abnormally.");
		}
	}

	/// Returns `true` once the loop has exited.
	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}
}
