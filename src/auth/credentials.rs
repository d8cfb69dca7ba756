//! Resource-owner credentials presented to the identity provider.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, IdentifierError, Secret},
};

/// Immutable client + user credentials used for the password grant and logout.
///
/// Both the client secret and the password are wrapped in [`Secret`], so the derived `Debug`
/// output never reveals them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// OAuth 2.0 client identifier.
	pub client_id: ClientId,
	/// Client secret for confidential clients.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<Secret>,
	/// Resource owner username.
	pub username: String,
	/// Resource owner password.
	pub password: Secret,
}
impl Credentials {
	/// Creates credentials for a public client.
	pub fn new(
		client_id: impl AsRef<str>,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Result<Self, IdentifierError> {
		let credentials = Self {
			client_id: ClientId::new(client_id)?,
			client_secret: None,
			username: username.into(),
			password: Secret::new(password),
		};

		credentials.validate()?;

		Ok(credentials)
	}

	/// Sets or replaces the client secret. Empty secrets are treated as absent.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		let secret = Secret::new(secret);

		self.client_secret = if secret.is_empty() { None } else { Some(secret) };

		self
	}

	/// Checks the fields that serde cannot validate on its own.
	pub fn validate(&self) -> Result<(), IdentifierError> {
		if self.username.is_empty() {
			return Err(IdentifierError::Empty { kind: "User" });
		}
		if self.username.chars().any(char::is_whitespace) {
			return Err(IdentifierError::ContainsWhitespace { kind: "User" });
		}

		Ok(())
	}

	/// Returns the client secret, filtering out empty values loaded from configuration.
	pub(crate) fn secret(&self) -> Option<&Secret> {
		self.client_secret.as_ref().filter(|secret| !secret.is_empty())
	}
}
