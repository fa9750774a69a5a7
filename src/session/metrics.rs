// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refreshes and secure requests.
#[derive(Debug, Default)]
pub struct SessionMetrics {
	csrf_exchanges: AtomicU64,
	csrf_reuses: AtomicU64,
	refresh_failures: AtomicU64,
	rotations_captured: AtomicU64,
	csrf_retries: AtomicU64,
	requests_sent: AtomicU64,
}
impl SessionMetrics {
	/// Returns the number of CSRF-exchange network calls that returned a token.
	pub fn csrf_exchanges(&self) -> u64 {
		self.csrf_exchanges.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes answered from the store without a network call.
	pub fn csrf_reuses(&self) -> u64 {
		self.csrf_reuses.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refreshes (`AuthExpired` or `CsrfRefreshFailed`).
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of rotated CSRF tokens captured from wrapped responses.
	pub fn rotations_captured(&self) -> u64 {
		self.rotations_captured.load(Ordering::Relaxed)
	}

	/// Returns the number of resends triggered by CSRF rejections.
	pub fn csrf_retries(&self) -> u64 {
		self.csrf_retries.load(Ordering::Relaxed)
	}

	/// Returns the number of wrapped requests handed to the transport.
	pub fn requests_sent(&self) -> u64 {
		self.requests_sent.load(Ordering::Relaxed)
	}

	pub(crate) fn record_exchange(&self) {
		self.csrf_exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reuse(&self) {
		self.csrf_reuses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rotation(&self) {
		self.rotations_captured.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.csrf_retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_request(&self) {
		self.requests_sent.fetch_add(1, Ordering::Relaxed);
	}
}
