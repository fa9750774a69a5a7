//! Session-level error types shared across the refresher, executor, transports, and stores.

// self
use crate::_prelude::*;

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical session error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) of a wrapped request.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The access token cannot be refreshed; the caller must re-authenticate.
	#[error("Session expired, re-authentication is required: {reason}.")]
	AuthExpired {
		/// Collaborator- or session-supplied reason string.
		reason: String,
	},
	/// The CSRF exchange failed while the access token is still valid.
	#[error("CSRF token refresh failed: {reason}.")]
	CsrfRefreshFailed {
		/// HTTP status code returned by the CSRF endpoint, when one was received.
		status: Option<u16>,
		/// Human-readable failure summary.
		reason: String,
	},
	/// The caller cancelled the operation before it completed.
	#[error("Secure request was cancelled.")]
	Cancelled,
}
impl Error {
	/// Returns `true` when the session is no longer usable and the caller must log in again.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::AuthExpired { .. })
	}

	/// Returns `true` when retrying the overall user action later is reasonable.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::CsrfRefreshFailed { .. } | Self::Transport(_))
	}
}

/// Configuration and validation failures raised by the session.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A credential could not be encoded as an HTTP header value.
	#[error("Credential cannot be encoded into the `{header}` header.")]
	InvalidHeaderValue {
		/// Header name that was being populated.
		header: String,
		/// Underlying encoding failure.
		#[source]
		source: ::http::header::InvalidHeaderValue,
	},
	/// Request could not be converted into the transport's native representation.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying conversion failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a request conversion failure inside [`ConfigError`].
	pub fn http_request(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpRequest { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
