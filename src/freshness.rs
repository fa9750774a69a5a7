//! Client-side CSRF freshness heuristic.
//!
//! CSRF tokens are opaque, so the session only knows when it acquired one. A token is
//! treated as stale once it is older than a max-age that sits below the server's assumed
//! lifetime (60 minutes), so proactive refreshes normally land before server-side expiry.
//! The server stays authoritative: rejections are still handled by the executor's retry
//! loop whenever this estimate is wrong.

// self
use crate::{_prelude::*, store::Credentials};

/// Decides whether a stored CSRF token should be renewed before use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreshnessPolicy {
	max_age: Duration,
}
impl FreshnessPolicy {
	/// Default max-age applied to CSRF tokens.
	pub const DEFAULT_MAX_AGE: Duration = Duration::minutes(50);

	/// Creates a policy with the provided max-age; negative values clamp to zero.
	pub fn new(max_age: Duration) -> Self {
		Self { max_age: if max_age.is_negative() { Duration::ZERO } else { max_age } }
	}

	/// Returns the configured max-age.
	pub fn max_age(&self) -> Duration {
		self.max_age
	}

	/// Returns `true` if the CSRF token is absent or older than the max-age at `now`.
	pub fn is_csrf_stale(&self, credentials: &Credentials, now: OffsetDateTime) -> bool {
		match &credentials.csrf {
			Some(csrf) if !csrf.token.is_blank() => now - csrf.refreshed_at > self.max_age,
			_ => true,
		}
	}
}
impl Default for FreshnessPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_MAX_AGE)
	}
}
