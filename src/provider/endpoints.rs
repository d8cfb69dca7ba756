//! Identity provider descriptor, endpoint path layouts, and candidate resolution.

// self
use crate::{_prelude::*, auth::Realm, error::ConfigError};

/// URL path convention used to reach a realm's OpenID Connect endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PathLayout {
	/// `{base}/realms/{realm}/protocol/openid-connect/*` (Keycloak 17 and newer).
	Modern,
	/// `{base}/auth/realms/{realm}/protocol/openid-connect/*` (WildFly-based Keycloak).
	Legacy,
	/// Explicit endpoint URLs for deployments behind rewriting proxies.
	Custom {
		/// Token endpoint.
		token: Url,
		/// Logout endpoint.
		logout: Url,
	},
}
impl PathLayout {
	/// Preference order used when no layouts are configured.
	pub fn defaults() -> Vec<PathLayout> {
		vec![PathLayout::Modern, PathLayout::Legacy]
	}

	/// Resolves the token and logout endpoints for `realm` under `base`.
	pub fn resolve(&self, base: &Url, realm: &Realm) -> Result<Endpoints, ConfigError> {
		let root = base.as_str().trim_end_matches('/');
		let prefix = match self {
			PathLayout::Custom { token, logout } =>
				return Ok(Endpoints { token: token.clone(), logout: logout.clone() }),
			PathLayout::Legacy if !root.ends_with("/auth") =>
				format!("{root}/auth/realms/{realm}/protocol/openid-connect"),
			PathLayout::Modern | PathLayout::Legacy =>
				format!("{root}/realms/{realm}/protocol/openid-connect"),
		};

		Ok(Endpoints {
			token: parse(format!("{prefix}/token"))?,
			logout: parse(format!("{prefix}/logout"))?,
		})
	}
}

/// Concrete endpoints produced by one layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
	/// Token endpoint used by the password and refresh grants.
	pub token: Url,
	/// Logout endpoint used to end the provider session.
	pub logout: Url,
}

/// Errors raised while constructing or validating an [`IdentityProvider`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum IdentityProviderError {
	/// At least one layout must be configured.
	#[error("Identity provider must declare at least one endpoint layout.")]
	NoLayouts,
	/// Endpoints must use HTTP(S).
	#[error("The {endpoint} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which URL failed validation.
		endpoint: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// The base URL must not carry a query or fragment, since paths are appended to it.
	#[error("The base URL must not contain a query or fragment: {url}.")]
	BaseUrlNotAPrefix {
		/// URL that failed validation.
		url: String,
	},
}

/// Location of a Keycloak-style identity provider and the layouts to probe, in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProvider {
	/// Server root, e.g. `https://keycloak.example.com` or `https://host/auth`.
	pub base_url: Url,
	/// Realm holding the client and user.
	pub realm: Realm,
	/// Layouts tried by the first login, most preferred first.
	#[serde(default = "PathLayout::defaults")]
	pub layouts: Vec<PathLayout>,
}
impl IdentityProvider {
	/// Creates a new builder for the provided base URL and realm.
	pub fn builder(base_url: Url, realm: Realm) -> IdentityProviderBuilder {
		IdentityProviderBuilder::new(base_url, realm)
	}

	/// Resolves every layout into endpoints, dropping duplicates while preserving order.
	pub fn candidates(&self) -> Result<Vec<Endpoints>, ConfigError> {
		let mut resolved = Vec::<Endpoints>::with_capacity(self.layouts.len());

		for layout in &self.layouts {
			let endpoints = layout.resolve(&self.base_url, &self.realm)?;

			if !resolved.contains(&endpoints) {
				resolved.push(endpoints);
			}
		}

		Ok(resolved)
	}

	/// Validates invariants for the descriptor.
	pub fn validate(&self) -> Result<(), IdentityProviderError> {
		if self.layouts.is_empty() {
			return Err(IdentityProviderError::NoLayouts);
		}

		validate_scheme("base", &self.base_url)?;

		if self.base_url.query().is_some() || self.base_url.fragment().is_some() {
			return Err(IdentityProviderError::BaseUrlNotAPrefix { url: self.base_url.to_string() });
		}

		for layout in &self.layouts {
			if let PathLayout::Custom { token, logout } = layout {
				validate_scheme("token", token)?;
				validate_scheme("logout", logout)?;
			}
		}

		Ok(())
	}
}

/// Builder for [`IdentityProvider`] values.
#[derive(Debug)]
pub struct IdentityProviderBuilder {
	base_url: Url,
	realm: Realm,
	layouts: Option<Vec<PathLayout>>,
}
impl IdentityProviderBuilder {
	/// Creates a new builder; without further calls the default layouts are probed.
	pub fn new(base_url: Url, realm: Realm) -> Self {
		Self { base_url, realm, layouts: None }
	}

	/// Appends a layout to the probe order.
	pub fn layout(mut self, layout: PathLayout) -> Self {
		self.layouts.get_or_insert_with(Vec::new).push(layout);

		self
	}

	/// Replaces the probe order.
	pub fn layouts<I>(mut self, layouts: I) -> Self
	where
		I: IntoIterator<Item = PathLayout>,
	{
		self.layouts = Some(layouts.into_iter().collect());

		self
	}

	/// Appends explicit endpoint URLs to the probe order.
	pub fn custom_endpoints(self, token: Url, logout: Url) -> Self {
		self.layout(PathLayout::Custom { token, logout })
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<IdentityProvider, IdentityProviderError> {
		let provider = IdentityProvider {
			base_url: self.base_url,
			realm: self.realm,
			layouts: self.layouts.unwrap_or_else(PathLayout::defaults),
		};

		provider.validate()?;

		Ok(provider)
	}
}

fn parse(raw: String) -> Result<Url, ConfigError> {
	Url::parse(&raw).map_err(|source| ConfigError::InvalidEndpoint { url: raw, source })
}

fn validate_scheme(name: &'static str, url: &Url) -> Result<(), IdentityProviderError> {
	if matches!(url.scheme(), "http" | "https") {
		Ok(())
	} else {
		Err(IdentityProviderError::UnsupportedScheme { endpoint: name, url: url.to_string() })
	}
}
