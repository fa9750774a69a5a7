//! Session configuration and its validating builder.

// crates.io
use ::http::HeaderName;
// self
use crate::{_prelude::*, csrf::CsrfProtocol, freshness::FreshnessPolicy};

/// Errors raised while constructing or validating a [`SessionConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum SessionConfigError {
	/// The CSRF endpoint must be an HTTP(S) URL.
	#[error("The CSRF endpoint must use http or https: {url}.")]
	UnsupportedScheme {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// At least one attempt is required.
	#[error("The secure executor needs at least one attempt.")]
	ZeroAttempts,
	/// Durations must not be negative.
	#[error("The {field} duration must not be negative.")]
	NegativeDuration {
		/// Which setting failed validation.
		field: &'static str,
	},
}

/// Tunables for a [`Session`](crate::session::Session).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
	/// Endpoint exchanging a bearer token for a fresh CSRF token (`GET`).
	pub csrf_endpoint: Url,
	/// Heuristic deciding when a stored CSRF token is renewed proactively.
	pub freshness: FreshnessPolicy,
	/// Total attempts (first send included) for a CSRF-rejected request.
	pub max_attempts: u32,
	/// Fixed delay between CSRF retry attempts.
	pub retry_delay: Duration,
	/// CSRF header, body fallback fields, and rejection signatures.
	pub protocol: CsrfProtocol,
}
impl SessionConfig {
	/// Default number of attempts for CSRF-rejected requests.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	/// Default delay between CSRF retry attempts.
	pub const DEFAULT_RETRY_DELAY: Duration = Duration::milliseconds(500);

	/// Starts a builder for the provided CSRF endpoint.
	pub fn builder(csrf_endpoint: Url) -> SessionConfigBuilder {
		SessionConfigBuilder::new(csrf_endpoint)
	}
}

/// Builder for [`SessionConfig`] values.
#[derive(Debug)]
pub struct SessionConfigBuilder {
	csrf_endpoint: Url,
	csrf_max_age: Duration,
	max_attempts: u32,
	retry_delay: Duration,
	protocol: CsrfProtocol,
}
impl SessionConfigBuilder {
	/// Creates a new builder seeded with defaults.
	pub fn new(csrf_endpoint: Url) -> Self {
		Self {
			csrf_endpoint,
			csrf_max_age: FreshnessPolicy::DEFAULT_MAX_AGE,
			max_attempts: SessionConfig::DEFAULT_MAX_ATTEMPTS,
			retry_delay: SessionConfig::DEFAULT_RETRY_DELAY,
			protocol: CsrfProtocol::default(),
		}
	}

	/// Overrides the CSRF max-age (defaults to 50 minutes).
	pub fn csrf_max_age(mut self, max_age: Duration) -> Self {
		self.csrf_max_age = max_age;

		self
	}

	/// Overrides the total attempt bound (defaults to 3).
	pub fn max_attempts(mut self, attempts: u32) -> Self {
		self.max_attempts = attempts;

		self
	}

	/// Overrides the delay between retries (defaults to 500 ms).
	pub fn retry_delay(mut self, delay: Duration) -> Self {
		self.retry_delay = delay;

		self
	}

	/// Overrides the CSRF header name (defaults to `X-CSRF-Token`).
	pub fn csrf_header(mut self, header: HeaderName) -> Self {
		self.protocol.header = header;

		self
	}

	/// Replaces the JSON body fields consulted when the CSRF header is absent.
	pub fn csrf_body_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.protocol.body_fields = fields.into_iter().map(Into::into).collect();

		self
	}

	/// Replaces the body fragments that identify a CSRF rejection.
	pub fn csrf_rejection_signatures<I, S>(mut self, signatures: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.protocol.rejection_signatures = signatures
			.into_iter()
			.map(Into::into)
			.filter(|signature: &String| !signature.is_empty())
			.collect();

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<SessionConfig, SessionConfigError> {
		if !matches!(self.csrf_endpoint.scheme(), "http" | "https") {
			return Err(SessionConfigError::UnsupportedScheme {
				url: self.csrf_endpoint.to_string(),
			});
		}
		if self.max_attempts == 0 {
			return Err(SessionConfigError::ZeroAttempts);
		}
		if self.csrf_max_age.is_negative() {
			return Err(SessionConfigError::NegativeDuration { field: "csrf_max_age" });
		}
		if self.retry_delay.is_negative() {
			return Err(SessionConfigError::NegativeDuration { field: "retry_delay" });
		}

		Ok(SessionConfig {
			csrf_endpoint: self.csrf_endpoint,
			freshness: FreshnessPolicy::new(self.csrf_max_age),
			max_attempts: self.max_attempts,
			retry_delay: self.retry_delay,
			protocol: self.protocol,
		})
	}
}
