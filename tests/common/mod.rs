#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use time::{Duration, OffsetDateTime};
// self
#[cfg(feature = "reqwest")]
use session_broker::{http::ReqwestHttpClient, reqwest::Client as ReqwestClient};
use session_broker::{
	auth::{AccessTokenSource, StoredAccessToken, TokenSecret},
	http::SessionHttpClient,
	session::{Session, SessionConfig},
	store::{CredentialStore, MemoryStore},
	url::Url,
};

pub const ACCESS_TOKEN: &str = "bearer-it";

/// Cookie-aware reqwest transport that accepts the self-signed certificates `httpmock`
/// serves.
#[cfg(feature = "reqwest")]
pub fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = ReqwestClient::builder()
		.cookie_store(true)
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Config pointing at `csrf_endpoint` with a short retry delay so retry tests stay fast.
pub fn test_config(csrf_endpoint: &str) -> SessionConfig {
	let endpoint = Url::parse(csrf_endpoint).expect("Failed to parse test CSRF endpoint.");

	SessionConfig::builder(endpoint)
		.retry_delay(Duration::milliseconds(10))
		.build()
		.expect("Failed to build test session config.")
}

/// Builds a session over `client` whose access token is read from an in-memory store.
pub fn build_session<C>(client: C, config: SessionConfig) -> (Session<C>, Arc<MemoryStore>)
where
	C: SessionHttpClient,
{
	let backend = Arc::new(MemoryStore::default());
	let store: Arc<dyn CredentialStore> = backend.clone();
	let access_tokens: Arc<dyn AccessTokenSource> =
		Arc::new(StoredAccessToken::new(store.clone()));

	(Session::with_http_client(store, access_tokens, config, client), backend)
}

/// Builds a reqwest-backed session whose CSRF endpoint is `csrf_endpoint`.
#[cfg(feature = "reqwest")]
pub fn build_reqwest_session(
	csrf_endpoint: &str,
) -> (Session<ReqwestHttpClient>, Arc<MemoryStore>) {
	build_session(test_reqwest_http_client(), test_config(csrf_endpoint))
}

/// Writes the shared test access token into the store.
pub async fn sign_in(store: &MemoryStore) {
	store
		.set_access_token(TokenSecret::new(ACCESS_TOKEN))
		.await
		.expect("Failed to seed the access token.");
}

/// Writes a CSRF token acquired `age` ago into the store.
pub async fn seed_csrf(store: &MemoryStore, token: &str, age: Duration) {
	store
		.set_csrf(TokenSecret::new(token), OffsetDateTime::now_utc() - age)
		.await
		.expect("Failed to seed the CSRF token.");
}

/// Reads the CSRF token currently stored.
pub fn stored_csrf(store: &MemoryStore) -> Option<String> {
	store.snapshot().csrf_token().map(|token| token.expose().to_owned())
}
