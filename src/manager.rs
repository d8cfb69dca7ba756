//! The token lifecycle manager shared by every outbound HTTP client of a service.
//!
//! A [`TokenManager`] owns one identity provider session. Call sites ask it for a valid bearer
//! token (or a ready-made header); it acquires, refreshes, and renews tokens behind the scenes
//! and guarantees that concurrent callers never trigger more than one renewal at a time.
//!
//! # Locking
//!
//! Token state sits behind a synchronous mutex that is only held for short copy-in/copy-out
//! sections. Network grants are serialized by an async renewal guard paired with a renewal
//! epoch, so a caller that waited on someone else's renewal observes that result instead of
//! starting another one. The guard is never held while sleeping between retries.

mod acquire;
mod logout;
mod metrics;
mod refresh;
mod renew;
mod token;

pub use metrics::ExchangeMetrics;
pub use renew::RenewalTask;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, Secret, TokenPhase, TokenSet, TokenState},
	clock::{Clock, SystemClock},
	config::ManagerConfig,
	error::ConfigError,
	http::TokenHttpClient,
	oauth::{BasicFacade, TransportErrorMapper},
	provider::{DefaultProviderStrategy, Endpoints, IdentityProvider, ProviderStrategy},
};
#[cfg(feature = "reqwest")]
use crate::{config::Settings, http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Manager specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestTokenManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Thread-safe bearer token lifecycle manager for one client/user pair.
///
/// Share it behind an [`Arc`]; every operation takes `&self`.
pub struct TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	provider: IdentityProvider,
	credentials: Credentials,
	config: ManagerConfig,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	strategy: Arc<dyn ProviderStrategy>,
	clock: Arc<dyn Clock>,
	pinned: Mutex<Option<Endpoints>>,
	state: Mutex<TokenState>,
	renewal: AsyncMutex<()>,
	renewal_epoch: AtomicU64,
	metrics: ExchangeMetrics,
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a manager that reuses the caller-provided transport + mapper pair.
	///
	/// No validation happens here; call [`Settings::validate`](crate::config::Settings::validate)
	/// or the individual `validate` methods first when the inputs come from configuration.
	pub fn with_http_client(
		provider: IdentityProvider,
		credentials: Credentials,
		config: ManagerConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			provider,
			credentials,
			config,
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			strategy: Arc::new(DefaultProviderStrategy),
			clock: Arc::new(SystemClock),
			pinned: Default::default(),
			state: Default::default(),
			renewal: Default::default(),
			renewal_epoch: Default::default(),
			metrics: Default::default(),
		}
	}

	/// Replaces the provider strategy used to classify failures and decorate requests.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Replaces the time source used for issue instants and staleness checks.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Identity provider this manager talks to.
	pub fn provider(&self) -> &IdentityProvider {
		&self.provider
	}

	/// Lifecycle tunables.
	pub fn config(&self) -> &ManagerConfig {
		&self.config
	}

	/// Exchange counters for this manager.
	pub fn metrics(&self) -> &ExchangeMetrics {
		&self.metrics
	}

	fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}

	fn pinned_endpoints(&self) -> Option<Endpoints> {
		self.pinned.lock().clone()
	}

	fn pin(&self, endpoints: &Endpoints) {
		let mut pinned = self.pinned.lock();

		if pinned.as_ref() != Some(endpoints) {
			tracing::info!(token_endpoint = %endpoints.token, "Pinned provider endpoints.");

			*pinned = Some(endpoints.clone());
		}
	}

	fn fresh_token(&self) -> Option<Secret> {
		let now = self.now();

		self.state.lock().fresh_token(now, self.config.renewal_buffer)
	}

	fn phase(&self) -> TokenPhase {
		let now = self.now();

		self.state.lock().phase(now, self.config.renewal_buffer)
	}

	fn session(&self) -> u64 {
		self.state.lock().session()
	}

	/// Installs the result of a grant started in `session`; `merge` sees the held tokens.
	fn install<F>(&self, session: u64, merge: F) -> Result<()>
	where
		F: FnOnce(Option<&TokenSet>) -> TokenSet,
	{
		let mut state = self.state.lock();
		let tokens = merge(state.tokens());
		let expires_at = tokens.expires_at;
		let has_refresh_token = tokens.refresh_token.is_some();

		if !state.install_within(session, tokens) {
			tracing::info!("Session ended during the grant; discarding its tokens.");

			return Err(Error::SessionEnded);
		}

		tracing::debug!(%expires_at, has_refresh_token, "Installed new tokens.");

		Ok(())
	}

	fn renewal_epoch(&self) -> u64 {
		self.renewal_epoch.load(Ordering::Acquire)
	}

	fn advance_renewal_epoch(&self) {
		self.renewal_epoch.fetch_add(1, Ordering::AcqRel);
	}

	fn facade(&self, endpoints: &Endpoints) -> Result<BasicFacade<C, M>> {
		BasicFacade::new(
			endpoints,
			&self.credentials,
			&self.config,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
	}
}
#[cfg(feature = "reqwest")]
impl TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Validates the inputs and creates a manager with its own reqwest transport.
	///
	/// The transport honors [`ManagerConfig::request_timeout`] and
	/// [`ManagerConfig::user_agent`] and never follows redirects.
	pub fn new(
		provider: IdentityProvider,
		credentials: Credentials,
		config: ManagerConfig,
	) -> Result<Self> {
		provider.validate().map_err(ConfigError::from)?;
		credentials.validate().map_err(ConfigError::from)?;
		config.validate()?;

		let http_client = ReqwestHttpClient::from_config(&config)?;

		Ok(Self::with_http_client(
			provider,
			credentials,
			config,
			http_client,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}

	/// Creates a manager from a deserialized settings document.
	pub fn from_settings(settings: Settings) -> Result<Self> {
		let Settings { provider, credentials, manager } = settings;

		Self::new(provider, credentials, manager)
	}
}
impl<C, M> Debug for TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("provider", &self.provider)
			.field("credentials", &self.credentials)
			.field("pinned", &self.pinned.lock().as_ref().map(|endpoints| &endpoints.token))
			.field("phase", &self.phase())
			.finish()
	}
}
