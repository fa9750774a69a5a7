//! Session orchestration: credential refresh and the secure request executor.

pub mod config;
pub mod execute;
pub mod refresh;

mod metrics;

pub use config::*;
pub use execute::*;
pub use metrics::SessionMetrics;
pub use refresh::*;

// std
use std::sync::atomic::AtomicU64;
// crates.io
use ::http::HeaderValue;
// self
use crate::{
	_prelude::*,
	auth::{AccessTokenSource, TokenSecret},
	error::ConfigError,
	http::SessionHttpClient,
	session::refresh::FailedExchange,
	store::{CredentialStore, Credentials},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Session specialized for the crate's default reqwest transport.
pub type ReqwestSession = Session<ReqwestHttpClient>;

/// Keeps one client session authenticated against a backend API.
///
/// The session owns the transport, the credential store, and the access-token
/// collaborator so callers only hand it requests. Clones share the same store, refresh
/// gate, and counters, which makes a cloned session a cheap handle for concurrent call
/// sites.
pub struct Session<C>
where
	C: ?Sized + SessionHttpClient,
{
	/// HTTP client used for CSRF exchanges and wrapped requests.
	pub http_client: Arc<C>,
	/// Credential store holding the access token and CSRF pair.
	pub store: Arc<dyn CredentialStore>,
	/// Collaborator producing a currently valid access token.
	pub access_tokens: Arc<dyn AccessTokenSource>,
	/// Endpoint, freshness, retry, and wire settings.
	pub config: SessionConfig,
	/// Shared counters for refresh and request outcomes.
	pub metrics: Arc<SessionMetrics>,
	refresh_gate: Arc<AsyncMutex<Option<FailedExchange>>>,
	csrf_generation: Arc<AtomicU64>,
	exchanges_finished: Arc<AtomicU64>,
}
impl<C> Session<C>
where
	C: ?Sized + SessionHttpClient,
{
	/// Creates a session that reuses the caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn CredentialStore>,
		access_tokens: Arc<dyn AccessTokenSource>,
		config: SessionConfig,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			access_tokens,
			config,
			metrics: Default::default(),
			refresh_gate: Default::default(),
			csrf_generation: Default::default(),
			exchanges_finished: Default::default(),
		}
	}

	/// Returns the current credential snapshot.
	pub async fn credentials(&self) -> Result<Credentials> {
		Ok(self.store.get().await?)
	}

	/// Clears every stored credential, returning the session to the anonymous state.
	pub async fn logout(&self) -> Result<()> {
		// Hold the gate so an in-flight exchange cannot repopulate the store afterwards.
		let _gate = self.refresh_gate.lock().await;

		self.store.clear().await?;

		Ok(())
	}
}
#[cfg(feature = "reqwest")]
impl Session<ReqwestHttpClient> {
	/// Creates a session with its own cookie-aware reqwest transport.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		access_tokens: Arc<dyn AccessTokenSource>,
		config: SessionConfig,
	) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(store, access_tokens, config, ReqwestHttpClient::cookie_jar()?))
	}
}
impl<C> Clone for Session<C>
where
	C: ?Sized + SessionHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			store: self.store.clone(),
			access_tokens: self.access_tokens.clone(),
			config: self.config.clone(),
			metrics: self.metrics.clone(),
			refresh_gate: self.refresh_gate.clone(),
			csrf_generation: self.csrf_generation.clone(),
			exchanges_finished: self.exchanges_finished.clone(),
		}
	}
}
impl<C> Debug for Session<C>
where
	C: ?Sized + SessionHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("csrf_endpoint", &self.config.csrf_endpoint.as_str())
			.field("max_attempts", &self.config.max_attempts)
			.finish()
	}
}

/// Encodes a credential as a sensitive header value (`prefix` is prepended verbatim).
pub(crate) fn secret_header(
	header: &str,
	prefix: &str,
	secret: &TokenSecret,
) -> Result<HeaderValue, ConfigError> {
	let mut value = HeaderValue::try_from(format!("{prefix}{}", secret.expose()))
		.map_err(|source| ConfigError::InvalidHeaderValue { header: header.into(), source })?;

	value.set_sensitive(true);

	Ok(value)
}
