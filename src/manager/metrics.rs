// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for provider exchanges.
#[derive(Debug, Default)]
pub struct ExchangeMetrics {
	password_grants: AtomicU64,
	refresh_grants: AtomicU64,
	failures: AtomicU64,
	logouts: AtomicU64,
}
impl ExchangeMetrics {
	/// Returns the number of password grant requests, one per probed layout.
	pub fn password_grants(&self) -> u64 {
		self.password_grants.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh grant requests.
	pub fn refresh_grants(&self) -> u64 {
		self.refresh_grants.load(Ordering::Relaxed)
	}

	/// Returns the number of grant and logout requests that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns the number of logout requests sent to the provider.
	pub fn logouts(&self) -> u64 {
		self.logouts.load(Ordering::Relaxed)
	}

	pub(crate) fn record_password_grant(&self) {
		self.password_grants.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_grant(&self) {
		self.refresh_grants.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_logout(&self) {
		self.logouts.fetch_add(1, Ordering::Relaxed);
	}
}
