//! Cached token state, staleness rules, and the diagnostic snapshot exposed to callers.

// self
use crate::{_prelude::*, auth::Secret};

/// Tokens issued by one successful grant.
///
/// The access token and its expiry live in the same value, so one can never be present without
/// the other.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
	/// Bearer token presented to downstream APIs.
	pub access_token: Secret,
	/// Refresh token, if the provider issued one.
	pub refresh_token: Option<Secret>,
	/// Local instant captured right before the grant request was sent.
	pub issued_at: OffsetDateTime,
	/// `issued_at + expires_in`, computed locally.
	pub expires_at: OffsetDateTime,
}
impl TokenSet {
	/// Builds a token set whose expiry is derived from the local request instant.
	///
	/// Returns `None` when `issued_at + expires_in` is not representable.
	pub fn new(
		access_token: Secret,
		refresh_token: Option<Secret>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Option<Self> {
		let expires_at = issued_at.checked_add(expires_in)?;

		Some(Self { access_token, refresh_token, issued_at, expires_at })
	}

	/// Returns `true` once `now` has entered the renewal buffer before expiry.
	///
	/// A buffer reaching past the earliest representable instant makes every token stale.
	pub fn is_stale_at(&self, now: OffsetDateTime, renewal_buffer: Duration) -> bool {
		self.expires_at.checked_sub(renewal_buffer).is_none_or(|threshold| now >= threshold)
	}

	/// Merges a refresh-grant result, keeping the current refresh token when the provider did
	/// not rotate it.
	pub fn rotated(self, next: TokenSet) -> TokenSet {
		TokenSet { refresh_token: next.refresh_token.or(self.refresh_token), ..next }
	}
}
impl Debug for TokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSet")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Lifecycle phase reported by [`TokenInfo`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPhase {
	/// No token has been acquired, or the session was logged out.
	Empty,
	/// A token is held and lies outside the renewal buffer.
	Valid,
	/// A token is held but has entered the renewal buffer.
	Stale,
	/// The last renewal attempt failed; the held token must not be used.
	Unavailable,
}

/// Mutable token state owned by a manager.
#[derive(Debug, Default)]
pub struct TokenState {
	tokens: Option<TokenSet>,
	renewal_failed: bool,
	session: u64,
}
impl TokenState {
	/// Returns the held tokens, if any.
	pub fn tokens(&self) -> Option<&TokenSet> {
		self.tokens.as_ref()
	}

	/// Returns the access token when it is outside the renewal buffer.
	pub fn fresh_token(&self, now: OffsetDateTime, renewal_buffer: Duration) -> Option<Secret> {
		self.tokens
			.as_ref()
			.filter(|tokens| !tokens.is_stale_at(now, renewal_buffer))
			.map(|tokens| tokens.access_token.clone())
	}

	/// Returns the held refresh token, if any.
	pub fn refresh_token(&self) -> Option<Secret> {
		self.tokens.as_ref().and_then(|tokens| tokens.refresh_token.clone())
	}

	/// Replaces the held tokens and leaves the unavailable phase.
	pub fn install(&mut self, tokens: TokenSet) {
		self.tokens = Some(tokens);
		self.renewal_failed = false;
	}

	/// Session generation; every [`clear`](Self::clear) starts a new one.
	pub fn session(&self) -> u64 {
		self.session
	}

	/// Installs tokens produced by a grant that started in `session`.
	///
	/// Returns `false` and leaves the state untouched when the session was cleared while the
	/// grant was in flight.
	pub fn install_within(&mut self, session: u64, tokens: TokenSet) -> bool {
		if self.session != session {
			return false;
		}

		self.install(tokens);

		true
	}

	/// Records that a renewal attempt failed without touching the held tokens.
	pub fn mark_renewal_failed(&mut self) {
		self.renewal_failed = true;
	}

	/// Drops every held token and ends the current session.
	pub fn clear(&mut self) {
		self.tokens = None;
		self.renewal_failed = false;
		self.session = self.session.wrapping_add(1);
	}

	/// Computes the lifecycle phase at `now`.
	pub fn phase(&self, now: OffsetDateTime, renewal_buffer: Duration) -> TokenPhase {
		match &self.tokens {
			None => TokenPhase::Empty,
			Some(tokens) if !tokens.is_stale_at(now, renewal_buffer) => TokenPhase::Valid,
			Some(_) if self.renewal_failed => TokenPhase::Unavailable,
			Some(_) => TokenPhase::Stale,
		}
	}

	/// Builds a secret-free snapshot at `now`.
	pub fn info(
		&self,
		now: OffsetDateTime,
		renewal_buffer: Duration,
		token_endpoint: Option<Url>,
	) -> TokenInfo {
		let tokens = self.tokens.as_ref();

		TokenInfo {
			phase: self.phase(now, renewal_buffer),
			has_refresh_token: tokens.is_some_and(|tokens| tokens.refresh_token.is_some()),
			issued_at: tokens.map(|tokens| tokens.issued_at),
			expires_at: tokens.map(|tokens| tokens.expires_at),
			expires_in: tokens.map(|tokens| tokens.expires_at - now),
			token_endpoint,
		}
	}
}

/// Diagnostic snapshot of a manager's token state. Carries no secret material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
	/// Current lifecycle phase.
	pub phase: TokenPhase,
	/// Whether a refresh token is held.
	pub has_refresh_token: bool,
	/// Instant the held token was requested.
	pub issued_at: Option<OffsetDateTime>,
	/// Instant the held token expires.
	pub expires_at: Option<OffsetDateTime>,
	/// Remaining lifetime; negative once expired.
	pub expires_in: Option<Duration>,
	/// Token endpoint pinned by the first successful login.
	pub token_endpoint: Option<Url>,
}
impl TokenInfo {
	/// Returns `true` when an access token is held, stale or not.
	pub fn has_token(&self) -> bool {
		self.expires_at.is_some()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn tokens(refresh: Option<&str>) -> TokenSet {
		TokenSet::new(
			Secret::new("access"),
			refresh.map(Secret::new),
			macros::datetime!(2025-01-01 00:00 UTC),
			Duration::hours(1),
		)
		.expect("Token set fixture should be representable.")
	}

	#[test]
	fn expiry_is_derived_from_issue_instant() {
		let tokens = tokens(Some("refresh"));

		assert_eq!(tokens.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
	}

	#[test]
	fn staleness_honors_the_renewal_buffer() {
		let tokens = tokens(None);
		let buffer = Duration::seconds(60);

		assert!(!tokens.is_stale_at(macros::datetime!(2025-01-01 00:58:59 UTC), buffer));
		assert!(tokens.is_stale_at(macros::datetime!(2025-01-01 00:59 UTC), buffer));
		assert!(tokens.is_stale_at(macros::datetime!(2025-01-01 02:00 UTC), buffer));
	}

	#[test]
	fn out_of_range_arithmetic_never_panics() {
		let issued_at = macros::datetime!(2025-01-01 00:00 UTC);

		assert!(
			TokenSet::new(Secret::new("access"), None, issued_at, Duration::MAX).is_none(),
			"Unrepresentable expiries must be refused."
		);
		assert!(tokens(None).is_stale_at(issued_at, Duration::MAX));
		assert!(!tokens(None).is_stale_at(issued_at, Duration::ZERO));
	}

	#[test]
	fn rotation_keeps_refresh_token_when_provider_omits_it() {
		let current = tokens(Some("refresh-1"));
		let next = TokenSet::new(
			Secret::new("access-2"),
			None,
			macros::datetime!(2025-01-01 00:59 UTC),
			Duration::minutes(30),
		)
		.expect("Token set fixture should be representable.");
		let merged = current.clone().rotated(next);

		assert_eq!(merged.access_token.expose(), "access-2");
		assert_eq!(merged.refresh_token.as_ref().map(Secret::expose), Some("refresh-1"));
		assert_eq!(merged.expires_at, macros::datetime!(2025-01-01 01:29 UTC));

		let rotated = current.rotated(tokens(Some("refresh-2")));

		assert_eq!(rotated.refresh_token.as_ref().map(Secret::expose), Some("refresh-2"));
	}

	#[test]
	fn phases_follow_the_lifecycle() {
		let buffer = Duration::seconds(60);
		let early = macros::datetime!(2025-01-01 00:10 UTC);
		let late = macros::datetime!(2025-01-01 00:59:30 UTC);
		let mut state = TokenState::default();

		assert_eq!(state.phase(early, buffer), TokenPhase::Empty);
		assert!(state.fresh_token(early, buffer).is_none());

		state.install(tokens(Some("refresh")));

		assert_eq!(state.phase(early, buffer), TokenPhase::Valid);
		assert_eq!(state.phase(late, buffer), TokenPhase::Stale);
		assert!(state.fresh_token(late, buffer).is_none());

		state.mark_renewal_failed();

		assert_eq!(state.phase(late, buffer), TokenPhase::Unavailable);
		assert!(state.refresh_token().is_some(), "Failed renewals must keep the last tokens.");

		state.install(tokens(None));

		assert_eq!(state.phase(early, buffer), TokenPhase::Valid);

		state.clear();

		assert_eq!(state.phase(early, buffer), TokenPhase::Empty);
		assert!(state.tokens().is_none());
	}

	#[test]
	fn grants_from_a_cleared_session_are_dropped() {
		let mut state = TokenState::default();
		let started = state.session();

		state.clear();

		assert!(!state.install_within(started, tokens(Some("refresh"))));
		assert!(state.tokens().is_none());
		assert!(state.install_within(state.session(), tokens(Some("refresh"))));
		assert!(state.tokens().is_some());
	}

	#[test]
	fn info_reports_metadata_only() {
		let mut state = TokenState::default();

		state.install(tokens(Some("refresh")));

		let info = state.info(macros::datetime!(2025-01-01 00:30 UTC), Duration::seconds(60), None);

		assert_eq!(info.phase, TokenPhase::Valid);
		assert!(info.has_token());
		assert!(info.has_refresh_token);
		assert_eq!(info.expires_in, Some(Duration::minutes(30)));

		let rendered = serde_json::to_string(&info).expect("Token info should serialize.");

		assert!(!rendered.contains("access"));
		assert!(rendered.contains("\"phase\":\"valid\""));
	}
}
