//! Optional observability helpers for session operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_broker.op` with the `op` and
//!   `stage` (call site) fields. Secure requests also fill in `attempts` and `class` as they
//!   progress. Debug/warn events cover refresh reuse, CSRF exchanges, shared failures,
//!   rotations, and retries. Token values are never recorded.
//! - Enable `metrics` to increment `session_broker_op_total{op,outcome}` for every
//!   attempt/success/failure and `session_broker_response_total{class}` for every wrapped
//!   response.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Session operations observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Credential refresh (`refresh_all` and forced CSRF exchanges).
	CsrfRefresh,
	/// Wrapped request executed through the secure executor.
	SecureRequest,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::CsrfRefresh => "csrf_refresh",
			OpKind::SecureRequest => "secure_request",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a session helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Emits a `debug` event when the `tracing` feature is enabled.
macro_rules! debug_event {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		::tracing::debug!($($arg)*);
	};
}
/// Emits a `warn` event when the `tracing` feature is enabled.
macro_rules! warn_event {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		::tracing::warn!($($arg)*);
	};
}
pub(crate) use {debug_event, warn_event};
