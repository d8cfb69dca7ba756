//! `Authorization: Bearer` header values handed to downstream HTTP clients.

// crates.io
use oauth2::http::{
	HeaderName, HeaderValue,
	header::{AUTHORIZATION, InvalidHeaderValue},
};
// self
use crate::{_prelude::*, auth::Secret};

/// Bearer credential ready to attach to an outgoing request.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationHeader {
	token: Secret,
}
impl AuthorizationHeader {
	/// Header name the value belongs under.
	pub const NAME: HeaderName = AUTHORIZATION;

	/// Wraps an access token.
	pub fn bearer(token: Secret) -> Self {
		Self { token }
	}

	/// Returns the wrapped access token.
	pub fn token(&self) -> &Secret {
		&self.token
	}

	/// Renders `Bearer <token>`. Callers must avoid logging this string.
	pub fn expose(&self) -> String {
		format!("Bearer {}", self.token.expose())
	}

	/// Converts into a header value flagged as sensitive, so HTTP stacks skip it when
	/// formatting requests.
	pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
		let mut value = HeaderValue::from_str(&self.expose())?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl Debug for AuthorizationHeader {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AuthorizationHeader").field(&"Bearer <redacted>").finish()
	}
}
impl TryFrom<AuthorizationHeader> for HeaderValue {
	type Error = InvalidHeaderValue;

	fn try_from(header: AuthorizationHeader) -> Result<Self, Self::Error> {
		header.to_header_value()
	}
}
