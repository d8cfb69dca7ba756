//! Internal OAuth client facade over the `oauth2` crate.
//!
//! One facade is built per endpoint layout. It issues the password and refresh grants, posts
//! logout requests through the same instrumented transport, and turns every failure into the
//! crate's error taxonomy with help from the configured [`ProviderStrategy`].

pub use oauth2;

// std
use std::collections::BTreeMap;
// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, ClientId as OAuthClientId, ClientSecret, EndpointNotSet,
	EndpointSet, HttpClientError, HttpRequest, RefreshToken, RequestTokenError,
	ResourceOwnerPassword, ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	auth::{Credentials, Secret, TokenSet},
	config::ManagerConfig,
	error::{ConfigError, NetworkError, ServerError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{Endpoints, GrantType, ProviderErrorContext, ProviderErrorKind, ProviderStrategy},
};
#[cfg(all(test, feature = "reqwest"))] use crate::http::ReqwestHttpClient;

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into manager [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a manager error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(*inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => NetworkError::Io(inner).into(),
			HttpClientError::Other(message) => ServerError::TokenEndpoint {
				message: format!(
					"HTTP client error occurred while calling the provider: {message}"
				),
				status: meta_status(meta),
			}
			.into(),
			_ => ServerError::TokenEndpoint {
				message: "HTTP client error occurred while calling the provider".into(),
				status: meta_status(meta),
			}
			.into(),
		}
	}
}

/// Per-layout client for the token and logout endpoints.
pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	logout_url: Url,
	client_id: String,
	client_secret: Option<Secret>,
	username: ResourceOwnerUsername,
	password: ResourceOwnerPassword,
	scopes: Vec<String>,
	default_expires_in: Duration,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		endpoints: &Endpoints,
		credentials: &Credentials,
		config: &ManagerConfig,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(endpoints.token.to_string()).map_err(|source| {
			ConfigError::InvalidEndpoint { url: endpoints.token.to_string(), source }
		})?;
		let client_secret = credentials.secret().cloned();
		let mut oauth_client =
			BasicClient::new(OAuthClientId::new(credentials.client_id.to_string()))
				.set_token_uri(token_url)
				.set_auth_type(AuthType::RequestBody);

		if let Some(secret) = &client_secret {
			oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(secret.expose().into()));
		}

		Ok(Self {
			oauth_client,
			logout_url: endpoints.logout.clone(),
			client_id: credentials.client_id.to_string(),
			client_secret,
			username: ResourceOwnerUsername::new(credentials.username.clone()),
			password: ResourceOwnerPassword::new(credentials.password.expose().into()),
			scopes: config.scopes.clone(),
			default_expires_in: config.default_expires_in,
			http_client,
			error_mapper,
		})
	}

	/// Resource-owner password grant.
	pub(crate) fn exchange_password<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		issued_at: OffsetDateTime,
	) -> FacadeFuture<'a, TokenSet> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut request = self.oauth_client.exchange_password(&self.username, &self.password);

			for scope in &self.scopes {
				request = request.add_scope(Scope::new(scope.to_owned()));
			}
			for (key, value) in extra_params(strategy, GrantType::Password) {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::Password,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(response, issued_at, self.default_expires_in)
		})
	}

	/// Refresh token grant. The returned set carries a refresh token only if one was rotated.
	pub(crate) fn exchange_refresh_token<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		refresh_token: &'a Secret,
		issued_at: OffsetDateTime,
	) -> FacadeFuture<'a, TokenSet> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

			for (key, value) in extra_params(strategy, GrantType::RefreshToken) {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::RefreshToken,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(response, issued_at, self.default_expires_in)
		})
	}

	/// Posts the refresh token to the logout endpoint and returns the HTTP status.
	pub(crate) fn end_session<'a>(&'a self, refresh_token: &'a Secret) -> FacadeFuture<'a, u16> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let request = self.logout_request(refresh_token)?;
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = instrumented
				.call(request)
				.await
				.map_err(|err| self.error_mapper.map_transport_error(meta.take().as_ref(), err))?;

			Ok(response.status().as_u16())
		})
	}

	fn logout_request(&self, refresh_token: &Secret) -> Result<HttpRequest> {
		let mut form = Serializer::new(String::new());

		form.append_pair("client_id", &self.client_id);

		if let Some(secret) = &self.client_secret {
			form.append_pair("client_secret", secret.expose());
		}

		form.append_pair("refresh_token", refresh_token.expose());

		Request::builder()
			.method(Method::POST)
			.uri(self.logout_url.as_str())
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.header(ACCEPT, "application/json")
			.body(form.finish().into_bytes())
			.map_err(|err| ConfigError::from(err).into())
	}
}
fn extra_params(strategy: &dyn ProviderStrategy, grant: GrantType) -> BTreeMap<String, String> {
	let mut form = BTreeMap::new();

	strategy.augment_token_request(grant, &mut form);

	form
}

fn map_token_response(
	response: BasicTokenResponse,
	issued_at: OffsetDateTime,
	default_expires_in: Duration,
) -> Result<TokenSet> {
	let expires_in = match response.expires_in() {
		None => default_expires_in,
		Some(lifetime) => Duration::try_from(lifetime)
			.ok()
			.filter(|lifetime| lifetime.is_positive())
			.ok_or(ServerError::InvalidExpiresIn { seconds: lifetime.as_secs() })?,
	};
	let access_token = response.access_token().secret();

	if access_token.is_empty() {
		return Err(ServerError::TokenEndpoint {
			message: "Token endpoint returned an empty access token".into(),
			status: Some(200),
		}
		.into());
	}

	let refresh_token = response
		.refresh_token()
		.map(|token| token.secret())
		.filter(|token| !token.is_empty())
		.map(Secret::new);

	TokenSet::new(Secret::new(access_token), refresh_token, issued_at, expires_in).ok_or_else(|| {
		ServerError::InvalidExpiresIn { seconds: expires_in.whole_seconds().unsigned_abs() }.into()
	})
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let status = meta_status(meta.as_ref());
	// `oauth2` reports non-200 bodies it cannot decode as parse failures, so the status decides
	// whether the provider refused the grant or sent a broken success payload.
	let failed_status = status.filter(|status| *status != 200);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, grant, response, status),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta.as_ref(), error),
		RequestTokenError::Parse(source, body) => match failed_status {
			Some(status) => {
				let ctx = ProviderErrorContext::new(grant)
					.with_http_status(status)
					.with_body_preview(String::from_utf8_lossy(&body));

				classified_error(grant, &ctx, strategy.classify_token_error(&ctx))
			},
			None => ServerError::TokenResponseParse { source, status }.into(),
		},
		RequestTokenError::Other(message) => match failed_status {
			Some(status) => {
				let ctx = ProviderErrorContext::new(grant).with_http_status(status);

				classified_error(grant, &ctx, strategy.classify_token_error(&ctx))
			},
			None => ServerError::TokenEndpoint {
				message: format!("Token endpoint returned an unexpected response: {message}"),
				status,
			}
			.into(),
		},
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	status: Option<u16>,
) -> Error {
	let mut ctx =
		ProviderErrorContext::new(grant).with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = status {
		ctx = ctx.with_http_status(status);
	}

	classified_error(grant, &ctx, strategy.classify_token_error(&ctx))
}

fn classified_error(
	grant: GrantType,
	ctx: &ProviderErrorContext,
	kind: ProviderErrorKind,
) -> Error {
	let reason = ctx.reason();

	match (kind, ctx.http_status) {
		(ProviderErrorKind::Rejected, _) => match grant {
			GrantType::Password => Error::InvalidCredentials { reason },
			GrantType::RefreshToken => Error::RefreshRejected { reason },
		},
		(ProviderErrorKind::Unexpected, Some(status)) => Error::UnexpectedStatus { status, reason },
		(ProviderErrorKind::Transient | ProviderErrorKind::Unexpected, status) =>
			ServerError::TokenEndpoint { message: reason, status }.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	NetworkError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}
